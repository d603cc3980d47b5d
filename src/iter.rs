//! Cursors over the values and subkeys of one key.
//!
//! Both iterators open their key with read rights when constructed and walk
//! it from the highest native index down to 0. Construction never fails: if
//! the key cannot be opened the iterator is simply invalid and yields
//! nothing. The order follows the store's native indices and is not stable
//! if the key is modified while iterating.
//!
//! Each iterator can be driven by hand with [`read`](RegistryValueIterator::read)
//! and [`advance`](RegistryValueIterator::advance), or used as a
//! `std::iter::Iterator` of owned entries.

use crate::access::{Access, View};
use crate::backend::RawKey;
use crate::buffer::GrowableBuffer;
use crate::codec::ValueData;
use crate::error::{RegistryError, Result};
use crate::key::RegKey;
use crate::registry::Registry;
use crate::types::ValueType;
use crate::utils::filetime_to_datetime;
use chrono::{DateTime, Utc};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One value yielded by [`RegistryValueIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValueEntry {
    /// Value name; empty for the default value.
    pub name: String,
    /// Stored type tag.
    pub value_type: ValueType,
    /// Raw value bytes.
    pub data: Vec<u8>,
}

/// One subkey yielded by [`RegistryKeyIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyEntry {
    /// Subkey name.
    pub name: String,
    /// Last write time (Windows FILETIME).
    pub last_written: u64,
}

impl KeyEntry {
    /// Converts the last write time to a UTC timestamp.
    pub fn last_written_datetime(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.last_written)
    }
}

fn open_for_read(registry: &Registry, parent: RawKey, folder: &str, view: View) -> Option<RegKey> {
    match registry.open_key(parent, folder, Access::READ | view) {
        Ok(key) => Some(key),
        Err(e) => {
            debug!(folder, error = %e, "Iterator key did not open");
            None
        }
    }
}

/// Cursor over the values of a key.
///
/// Value data is read into a buffer that starts at
/// `RegistryConfig::initial_buffer_len` bytes. When a value does not fit the
/// buffer grows to the size the store reports and the read is retried once;
/// the name capacity is raised to `RegistryConfig::max_name_len` at the same
/// time.
///
/// # Examples
///
/// ```rust
/// use reg_access::{Access, Registry, RegistryValueIterator, RootKey};
///
/// # fn main() -> reg_access::Result<()> {
/// let registry = Registry::in_memory();
/// let key = registry.create_key(RootKey::CurrentUser, "Iter", Access::ALL_ACCESS)?;
/// key.write_u32("a", 1)?;
/// key.write_u32("b", 2)?;
///
/// let names: Vec<String> = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Iter")
///     .map(|entry| entry.name)
///     .collect();
/// assert_eq!(names, ["b", "a"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RegistryValueIterator {
    key: Option<RegKey>,
    index: i64,
    name: String,
    value: GrowableBuffer,
    value_type: ValueType,
    name_capacity: usize,
    max_name_len: usize,
    current: bool,
}

impl RegistryValueIterator {
    /// Opens `folder` under `parent` in the default view.
    pub fn new(registry: &Registry, parent: impl Into<RawKey>, folder: &str) -> Self {
        Self::with_view(registry, parent, folder, View::Default)
    }

    /// Opens `folder` under `parent` in `view`.
    pub fn with_view(registry: &Registry, parent: impl Into<RawKey>, folder: &str, view: View) -> Self {
        let config = registry.config();
        let key = open_for_read(registry, parent.into(), folder, view);
        let index = key.as_ref().map_or(-1, |key| i64::from(key.value_count()) - 1);

        let mut iter = Self {
            key,
            index,
            name: String::new(),
            value: GrowableBuffer::with_capacity(config.initial_buffer_len),
            value_type: ValueType::None,
            name_capacity: config.initial_buffer_len,
            max_name_len: config.max_name_len,
            current: false,
        };
        iter.read();
        iter
    }

    /// Returns the number of values, re-queried from the key.
    pub fn value_count(&self) -> u32 {
        self.key.as_ref().map_or(0, RegKey::value_count)
    }

    /// Returns true while the key is open and the index is not exhausted.
    pub fn is_valid(&self) -> bool {
        self.key.is_some() && self.index >= 0
    }

    /// Returns the current index.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Moves to the next lower index and reads it.
    pub fn advance(&mut self) {
        self.index -= 1;
        self.read();
    }

    /// Reads the entry at the current index.
    ///
    /// Returns false, and clears the cached name and data, if the iterator
    /// is invalid or the store refused the read.
    pub fn read(&mut self) -> bool {
        self.current = self.fetch().is_ok();
        if !self.current {
            self.name.clear();
            self.value.clear();
            self.value_type = ValueType::None;
        }
        self.current
    }

    /// Name of the current value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw bytes of the current value.
    pub fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    /// Size of the current value in bytes.
    pub fn value_size(&self) -> usize {
        self.value.len()
    }

    /// Type of the current value.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Decodes the current value.
    pub fn value_data(&self) -> Result<ValueData> {
        let key = self.key.as_ref().ok_or_else(RegistryError::invalid_handle)?;
        ValueData::parse(self.value(), self.value_type, key.registry().config().text_encoding)
    }

    fn fetch(&mut self) -> Result<()> {
        if !self.is_valid() {
            return Err(RegistryError::invalid_handle());
        }
        let key = self.key.as_ref().ok_or_else(RegistryError::invalid_handle)?;
        let raw = key.raw().ok_or_else(RegistryError::invalid_handle)?;
        let backend = key.registry().backend();
        let index = self.index as u32;

        let entry = match backend.enum_value(raw, index, self.name_capacity, Some(self.value.as_mut_slice())) {
            Err(RegistryError::BufferTooSmall { required }) => {
                self.value.grow_to(required);
                self.name_capacity = self.name_capacity.max(self.max_name_len);
                backend.enum_value(raw, index, self.name_capacity, Some(self.value.as_mut_slice()))?
            }
            other => other?,
        };

        let entry = entry.ok_or_else(|| RegistryError::not_found("value index", &index.to_string()))?;
        self.value.set_len(entry.data_len);
        self.value_type = entry.value_type;
        self.name = entry.name;
        Ok(())
    }
}

impl Iterator for RegistryValueIterator {
    type Item = ValueEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.is_valid() {
            let entry = self.current.then(|| ValueEntry {
                name: self.name.clone(),
                value_type: self.value_type,
                data: self.value.as_slice().to_vec(),
            });
            self.advance();
            if entry.is_some() {
                return entry;
            }
        }
        None
    }
}

/// Cursor over the immediate subkeys of a key.
#[derive(Debug)]
pub struct RegistryKeyIterator {
    key: Option<RegKey>,
    index: i64,
    name: String,
    last_written: u64,
    name_capacity: usize,
    max_name_len: usize,
    current: bool,
}

impl RegistryKeyIterator {
    /// Opens `folder` under `parent` in the default view.
    pub fn new(registry: &Registry, parent: impl Into<RawKey>, folder: &str) -> Self {
        Self::with_view(registry, parent, folder, View::Default)
    }

    /// Opens `folder` under `parent` in `view`.
    pub fn with_view(registry: &Registry, parent: impl Into<RawKey>, folder: &str, view: View) -> Self {
        let config = registry.config();
        let key = open_for_read(registry, parent.into(), folder, view);
        let index = key.as_ref().map_or(-1, |key| i64::from(key.subkey_count()) - 1);

        let mut iter = Self {
            key,
            index,
            name: String::new(),
            last_written: 0,
            name_capacity: config.initial_buffer_len,
            max_name_len: config.max_name_len,
            current: false,
        };
        iter.read();
        iter
    }

    /// Returns the number of subkeys, re-queried from the key.
    pub fn subkey_count(&self) -> u32 {
        self.key.as_ref().map_or(0, RegKey::subkey_count)
    }

    /// Returns true while the key is open and the index is not exhausted.
    pub fn is_valid(&self) -> bool {
        self.key.is_some() && self.index >= 0
    }

    /// Returns the current index.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Moves to the next lower index and reads it.
    pub fn advance(&mut self) {
        self.index -= 1;
        self.read();
    }

    /// Reads the subkey at the current index.
    pub fn read(&mut self) -> bool {
        self.current = self.fetch().is_ok();
        if !self.current {
            self.name.clear();
            self.last_written = 0;
        }
        self.current
    }

    /// Name of the current subkey.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last write time of the current subkey (Windows FILETIME).
    pub fn last_written(&self) -> u64 {
        self.last_written
    }

    fn fetch(&mut self) -> Result<()> {
        if !self.is_valid() {
            return Err(RegistryError::invalid_handle());
        }
        let key = self.key.as_ref().ok_or_else(RegistryError::invalid_handle)?;
        let raw = key.raw().ok_or_else(RegistryError::invalid_handle)?;
        let backend = key.registry().backend();
        let index = self.index as u32;

        let entry = match backend.enum_key(raw, index, self.name_capacity) {
            Err(RegistryError::BufferTooSmall { .. }) => {
                self.name_capacity = self.name_capacity.max(self.max_name_len);
                backend.enum_key(raw, index, self.name_capacity)?
            }
            other => other?,
        };

        let entry = entry.ok_or_else(|| RegistryError::not_found("subkey index", &index.to_string()))?;
        self.last_written = entry.last_written;
        self.name = entry.name;
        Ok(())
    }
}

impl Iterator for RegistryKeyIterator {
    type Item = KeyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.is_valid() {
            let entry = self.current.then(|| KeyEntry {
                name: self.name.clone(),
                last_written: self.last_written,
            });
            self.advance();
            if entry.is_some() {
                return entry;
            }
        }
        None
    }
}
