//! Registry context shared by handles and iterators.

use crate::access::Access;
use crate::backend::{RawKey, RegistryBackend};
use crate::config::RegistryConfig;
use crate::environment::{Environment, ProcessEnvironment};
use crate::error::Result;
use crate::key::RegKey;
use crate::memory::MemoryRegistry;
use std::fmt;
use std::sync::Arc;

/// A backend together with the settings used to read and write it.
///
/// `Registry` is cheap to clone; every [`RegKey`] and iterator carries one so
/// it can release its raw handle on drop. There is no process-wide instance:
/// callers create the context they need and pass it explicitly.
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn RegistryBackend>,
    config: Arc<RegistryConfig>,
    environment: Arc<dyn Environment>,
}

impl Registry {
    /// Wraps a backend with default settings and the process environment.
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            config: Arc::new(RegistryConfig::default()),
            environment: Arc::new(ProcessEnvironment),
        }
    }

    /// Creates a registry over a fresh [`MemoryRegistry`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRegistry::new()))
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Replaces the environment used to expand `%NAME%` placeholders.
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &dyn RegistryBackend {
        self.backend.as_ref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the expansion environment.
    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    /// Creates (or opens) `path` under `parent` and returns the bound handle.
    pub fn create_key(&self, parent: impl Into<RawKey>, path: &str, access: Access) -> Result<RegKey> {
        let mut key = RegKey::new(self);
        key.create(parent, path, access)?;
        Ok(key)
    }

    /// Opens an existing `path` under `parent` and returns the bound handle.
    pub fn open_key(&self, parent: impl Into<RawKey>, path: &str, access: Access) -> Result<RegKey> {
        let mut key = RegKey::new(self);
        key.open(parent, path, access)?;
        Ok(key)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("config", &self.config).finish_non_exhaustive()
    }
}
