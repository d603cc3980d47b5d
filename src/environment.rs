//! Environment variable sources for expandable string values.

use std::collections::HashMap;

/// A source of environment variables for `%NAME%` expansion.
pub trait Environment: Send + Sync {
    /// Returns the value of `name`, or `None` if it is not defined.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads variables from the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed variable maps, matched case-insensitively like the Windows
/// environment block.
impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned().or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        })
    }
}
