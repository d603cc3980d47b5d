//! The native-handle boundary between the access layer and a store.
//!
//! A [`RegistryBackend`] exposes the raw primitives a platform registry
//! offers: open and create relative to a raw handle, close, query and set
//! values, enumerate by index, and delete a single key. The access layer
//! builds handle ownership, typed reads, iteration and recursive deletion on
//! top of these calls and nothing else.
//!
//! Predefined roots are raw handles too (see [`RootKey::raw`]); backends
//! must accept them as parents and treat closing them as a no-op.
//!
//! [`RootKey::raw`]: crate::types::RootKey::raw

use crate::access::{Access, View};
use crate::error::Result;
use crate::types::{Disposition, ValueType};
use crate::utils::filetime_to_datetime;
use chrono::{DateTime, Utc};
use std::fmt;

/// An opaque native key handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawKey(pub u64);

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey({:#x})", self.0)
    }
}

/// Metadata about an open key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfo {
    /// Number of immediate subkeys.
    pub subkey_count: u32,

    /// Length of the longest subkey name, in characters.
    pub max_subkey_name_len: u32,

    /// Number of values.
    pub value_count: u32,

    /// Length of the longest value name, in characters.
    pub max_value_name_len: u32,

    /// Size of the largest value data, in bytes.
    pub max_value_data_len: u32,

    /// Last write time (Windows FILETIME).
    pub last_written: u64,
}

impl KeyInfo {
    /// Converts the last write time to a UTC timestamp.
    pub fn last_written_datetime(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.last_written)
    }
}

/// Type and size of a queried value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueInfo {
    /// Stored type tag.
    pub value_type: ValueType,

    /// Size of the stored data in bytes.
    pub data_len: usize,
}

/// One value returned by index enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Value name; empty for the default value.
    pub name: String,

    /// Stored type tag.
    pub value_type: ValueType,

    /// Size of the value data in bytes.
    pub data_len: usize,
}

/// One subkey returned by index enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumKey {
    /// Subkey name.
    pub name: String,

    /// Last write time of the subkey (Windows FILETIME).
    pub last_written: u64,
}

/// Raw primitives of a hierarchical, handle-based store.
///
/// Every method is synchronous. Implementations must be safe to call from
/// several threads at once, but a single raw handle is only ever used by the
/// one [`RegKey`](crate::key::RegKey) that owns it.
pub trait RegistryBackend: Send + Sync {
    /// Creates `path` under `parent` (with missing intermediates) or opens it.
    ///
    /// An empty `path` opens a new handle to `parent` itself.
    fn create_key(&self, parent: RawKey, path: &str, access: Access) -> Result<(RawKey, Disposition)>;

    /// Opens an existing key.
    fn open_key(&self, parent: RawKey, path: &str, access: Access) -> Result<RawKey>;

    /// Releases a handle. Closing a predefined root is a no-op.
    fn close_key(&self, key: RawKey) -> Result<()>;

    /// Returns counts, maximum lengths and the last write time.
    fn query_info(&self, key: RawKey) -> Result<KeyInfo>;

    /// Queries a value.
    ///
    /// With `data` set to `None` only the type and size are reported. With a
    /// buffer, the data is copied into it; a buffer shorter than the data
    /// fails with `BufferTooSmall` carrying the exact size needed.
    fn query_value(&self, key: RawKey, name: &str, data: Option<&mut [u8]>) -> Result<ValueInfo>;

    /// Creates or overwrites a value.
    fn set_value(&self, key: RawKey, name: &str, value_type: ValueType, data: &[u8]) -> Result<()>;

    /// Deletes a value.
    fn delete_value(&self, key: RawKey, name: &str) -> Result<()>;

    /// Deletes the key at `path` under `parent`, looked up in `view`.
    ///
    /// Fails with `NotEmpty` if the key still has subkeys; its values are
    /// removed with it.
    fn delete_key(&self, parent: RawKey, path: &str, view: View) -> Result<()>;

    /// Reads the subkey at `index`.
    ///
    /// Returns `Ok(None)` once `index` is past the last subkey, and
    /// `BufferTooSmall` if the name is longer than `name_capacity`.
    fn enum_key(&self, key: RawKey, index: u32, name_capacity: usize) -> Result<Option<EnumKey>>;

    /// Reads the value at `index`.
    ///
    /// With `data` set to `None` only the name, type and size are reported.
    /// Returns `Ok(None)` once `index` is past the last value. Fails with
    /// `BufferTooSmall` if the data does not fit in `data` or the name does
    /// not fit in `name_capacity`; `required` is the data size needed, or
    /// the current buffer size when only the name overflowed.
    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name_capacity: usize,
        data: Option<&mut [u8]>,
    ) -> Result<Option<EnumValue>>;
}
