//! # Registry Access Layer
//!
//! Owned handles, typed values, cursors and subtree deletion over a
//! Windows-Registry-style hierarchical store.
//!
//! ## Features
//!
//! - **Owned handles**: [`RegKey`] closes its native handle on drop and is move-only
//! - **Typed values**: dwords, qwords, strings, expandable strings, multi-strings and raw bytes
//! - **View safety**: a handle opened in the 32-bit or 64-bit view rejects child operations in any other view
//! - **Cursors**: value and subkey iterators that grow their buffers to fit
//! - **Recursive delete**: whole subtrees removed without call-stack recursion
//! - **Pluggable stores**: any [`RegistryBackend`]; [`MemoryRegistry`] ships in-process
//!
//! ## Architecture
//!
//! The layer is built from the bottom up:
//!
//! 1. **Backend** ([`backend`]): raw open/create/close, query/set, enumerate-by-index, delete-one-key
//! 2. **Codec** ([`codec`]): byte encodings for each value type and `%NAME%` expansion
//! 3. **Context** ([`Registry`]): a backend plus [`RegistryConfig`] and an [`Environment`]
//! 4. **Handles** ([`RegKey`]): ownership, views, typed reads and writes
//! 5. **Cursors** ([`iter`]) and **deletion** ([`delete`]) on top of handles
//!
//! ## Status Codes
//!
//! Every failure is a [`RegistryError`], which converts to and from the
//! native status numbers:
//!
//! ```text
//! NotFound          2     ERROR_FILE_NOT_FOUND
//! AccessDenied      5     ERROR_ACCESS_DENIED
//! InvalidArgument   87    ERROR_INVALID_PARAMETER
//! NotEmpty          145   ERROR_DIR_NOT_EMPTY
//! BufferTooSmall    234   ERROR_MORE_DATA
//! CantRead          1012  ERROR_CANTREAD
//! TypeMismatch      1629  ERROR_DATATYPE_MISMATCH
//! Unknown(code)     any other status
//! ```
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use reg_access::{Access, Registry, RootKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::in_memory();
//!
//! // Create a key and write a few values
//! let key = registry.create_key(RootKey::CurrentUser, "Software\\Vendor\\App", Access::ALL_ACCESS)?;
//! key.write_string("InstallDir", "C:\\Program Files\\App")?;
//! key.write_multi_string("Plugins", &["core", "extra"])?;
//!
//! // Read them back through a read-only handle
//! let key = registry.open_key(RootKey::CurrentUser, "Software\\Vendor\\App", Access::READ)?;
//! println!("Installed in {}", key.read_string("InstallDir")?);
//! for plugin in key.read_multi_string("Plugins")? {
//!     println!("  Plugin: {}", plugin);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Enumerating and Deleting
//!
//! ```rust
//! use reg_access::{Access, Registry, RegistryKeyIterator, RootKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::in_memory();
//! registry.create_key(RootKey::CurrentUser, "Tree\\A\\Deep", Access::ALL_ACCESS)?;
//! registry.create_key(RootKey::CurrentUser, "Tree\\B", Access::ALL_ACCESS)?;
//!
//! for subkey in RegistryKeyIterator::new(&registry, RootKey::CurrentUser, "Tree") {
//!     println!("Subkey: {}", subkey.name);
//! }
//!
//! let root = registry.open_key(RootKey::CurrentUser, "", Access::ALL_ACCESS)?;
//! root.delete_key("Tree")?;
//! assert_eq!(RegistryKeyIterator::new(&registry, RootKey::CurrentUser, "Tree").count(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Handle lifecycle, buffer growth and deletion progress are reported
//! through `tracing`. The library never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod backend;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod delete;
pub mod environment;
pub mod error;
pub mod iter;
pub mod key;
pub mod memory;
pub mod registry;
pub mod types;
pub mod utils;

// Snapshot export/import (only compiled when the serde feature is enabled)
#[cfg(feature = "serde")]
pub mod snapshot;

// Re-export main types for convenience
pub use access::{Access, View};
pub use backend::{EnumKey, EnumValue, KeyInfo, RawKey, RegistryBackend, ValueInfo};
pub use codec::ValueData;
pub use config::{RegistryConfig, TextEncoding};
pub use environment::{Environment, ProcessEnvironment};
pub use error::{RegistryError, Result};
pub use iter::{KeyEntry, RegistryKeyIterator, RegistryValueIterator, ValueEntry};
pub use key::RegKey;
pub use memory::MemoryRegistry;
pub use registry::Registry;
pub use types::{Disposition, RootKey, ValueType};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
