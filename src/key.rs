//! Owned registry key handles.
//!
//! A [`RegKey`] owns at most one raw handle. It starts empty, becomes bound
//! on a successful create or open, and releases the raw handle when closed or
//! dropped. It is move-only: there is no `Clone`, so exactly one value is
//! responsible for closing each handle.
//!
//! The view qualifier a handle was opened with is remembered, and every
//! child operation through the handle must request the same view. After a
//! process opens a key in the 32-bit or 64-bit view, creating, opening or
//! deleting children without the same flag silently lands in the other
//! namespace; here it is rejected with `InvalidArgument` instead.
//!
//! # Examples
//!
//! ```rust
//! use reg_access::{Access, Registry, RootKey};
//!
//! # fn main() -> reg_access::Result<()> {
//! let registry = Registry::in_memory();
//! let key = registry.create_key(RootKey::CurrentUser, "Software\\Example", Access::ALL_ACCESS)?;
//! key.write_u32("Launches", 3)?;
//! key.write_string("Path", "C:\\Example")?;
//!
//! assert_eq!(key.read_u32("Launches")?, 3);
//! assert_eq!(key.read_string("Path")?, "C:\\Example");
//! # Ok(())
//! # }
//! ```

use crate::access::{Access, View};
use crate::backend::{KeyInfo, RawKey, ValueInfo};
use crate::codec::{
    decode_multi_string, decode_string, decode_u32, decode_u64, encode_multi_string, encode_string, encode_u32,
    encode_u64, expand_environment_placeholders, ValueData,
};
use crate::delete::delete_tree;
use crate::error::{RegistryError, Result};
use crate::registry::Registry;
use crate::types::{Disposition, ValueType};
use tracing::{debug, instrument, warn};

/// An owned handle to one open registry key.
#[derive(Debug)]
pub struct RegKey {
    registry: Registry,
    raw: Option<RawKey>,
    view: View,
}

impl RegKey {
    /// Creates an empty handle.
    pub fn new(registry: &Registry) -> Self {
        Self {
            registry: registry.clone(),
            raw: None,
            view: View::Default,
        }
    }

    /// Takes ownership of a raw handle opened elsewhere.
    ///
    /// `view` must be the view the raw handle was opened in; it is not
    /// checked.
    pub fn from_raw(registry: &Registry, raw: RawKey, view: View) -> Self {
        Self {
            registry: registry.clone(),
            raw: Some(raw),
            view,
        }
    }

    /// Creates the key when `access` asks for any write right, opens it
    /// otherwise.
    pub fn with_path(registry: &Registry, parent: impl Into<RawKey>, path: &str, access: Access) -> Result<Self> {
        let mut key = Self::new(registry);
        if access.wants_write() {
            key.create(parent, path, access)?;
        } else {
            key.open(parent, path, access)?;
        }
        Ok(key)
    }

    /// Returns the registry this handle belongs to.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the raw handle, if bound.
    pub fn raw(&self) -> Option<RawKey> {
        self.raw
    }

    /// Returns the view the handle was opened in.
    pub fn view(&self) -> View {
        self.view
    }

    /// Returns true while the handle is bound.
    pub fn is_valid(&self) -> bool {
        self.raw.is_some()
    }

    /// Creates `path` under `parent`, or opens it if it exists.
    pub fn create(&mut self, parent: impl Into<RawKey>, path: &str, access: Access) -> Result<()> {
        self.create_with_disposition(parent, path, access).map(|_| ())
    }

    /// Like [`create`](Self::create), also reporting whether the key was new.
    #[instrument(skip(self, parent))]
    pub fn create_with_disposition(
        &mut self,
        parent: impl Into<RawKey>,
        path: &str,
        access: Access,
    ) -> Result<Disposition> {
        let view = access.view()?;
        let (raw, disposition) = self.registry.backend().create_key(parent.into(), path, access)?;
        debug!(?raw, ?disposition, "Created key");
        self.replace(raw, view);
        Ok(disposition)
    }

    /// Opens an existing `path` under `parent`.
    #[instrument(skip(self, parent))]
    pub fn open(&mut self, parent: impl Into<RawKey>, path: &str, access: Access) -> Result<()> {
        let view = access.view()?;
        let raw = self.registry.backend().open_key(parent.into(), path, access)?;
        debug!(?raw, "Opened key");
        self.replace(raw, view);
        Ok(())
    }

    /// Creates or opens a child and returns it as a new handle.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `access` selects a different view than this
    /// handle was opened with; neither handle is touched.
    pub fn create_child(&self, name: &str, access: Access) -> Result<RegKey> {
        let raw = self.handle()?;
        self.check_view(access)?;
        let mut child = RegKey::new(&self.registry);
        child.create(raw, name, access)?;
        Ok(child)
    }

    /// Opens a child and returns it as a new handle.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a view mismatch, `NotFound` if the child is
    /// missing, `AccessDenied` without the rights.
    pub fn open_child(&self, name: &str, access: Access) -> Result<RegKey> {
        let raw = self.handle()?;
        self.check_view(access)?;
        let mut child = RegKey::new(&self.registry);
        child.open(raw, name, access)?;
        Ok(child)
    }

    /// Creates or opens a child and rebinds this handle to it.
    pub fn create_key(&mut self, name: &str, access: Access) -> Result<()> {
        let mut child = self.create_child(name, access)?;
        self.adopt(&mut child);
        Ok(())
    }

    /// Opens a child and rebinds this handle to it.
    pub fn open_key(&mut self, name: &str, access: Access) -> Result<()> {
        let mut child = self.open_child(name, access)?;
        self.adopt(&mut child);
        Ok(())
    }

    /// Releases the raw handle. Safe to call on an empty handle.
    pub fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(e) = self.registry.backend().close_key(raw) {
                warn!(?raw, error = %e, "Failed to close registry key");
            }
        }
        self.view = View::Default;
    }

    /// Replaces the owned raw handle, closing the previous one.
    pub fn set(&mut self, raw: RawKey, view: View) {
        if self.raw != Some(raw) {
            self.close();
            self.raw = Some(raw);
        }
        self.view = view;
    }

    /// Gives up ownership of the raw handle; this handle becomes empty and
    /// will not close it.
    pub fn take(&mut self) -> Option<RawKey> {
        self.view = View::Default;
        self.raw.take()
    }

    /// Returns counts, maximum lengths and the last write time.
    pub fn query_info(&self) -> Result<KeyInfo> {
        self.registry.backend().query_info(self.handle()?)
    }

    /// Returns true if the value exists and can be queried.
    pub fn has_value(&self, name: &str) -> bool {
        self.value_info(name).is_ok()
    }

    /// Returns the number of values, or 0 if it cannot be determined.
    pub fn value_count(&self) -> u32 {
        self.query_info().map(|info| info.value_count).unwrap_or(0)
    }

    /// Returns the number of subkeys, or 0 if it cannot be determined.
    pub fn subkey_count(&self) -> u32 {
        self.query_info().map(|info| info.subkey_count).unwrap_or(0)
    }

    /// Returns the name of the value at `index` in native order.
    pub fn value_name_at(&self, index: u32) -> Result<String> {
        let raw = self.handle()?;
        let max_name_len = self.registry.config().max_name_len;
        self.registry
            .backend()
            .enum_value(raw, index, max_name_len, None)?
            .map(|value| value.name)
            .ok_or_else(|| RegistryError::not_found("value index", &index.to_string()))
    }

    /// Deletes a value.
    pub fn delete_value(&self, name: &str) -> Result<()> {
        self.registry.backend().delete_value(self.handle()?, name)
    }

    /// Deletes a child key that has no subkeys and no values.
    ///
    /// # Errors
    ///
    /// `NotEmpty` if the child still has subkeys or values.
    #[instrument(skip(self))]
    pub fn delete_empty_key(&self, name: &str) -> Result<()> {
        let raw = self.handle()?;
        let child = self.open_child(name, Access::READ | self.view)?;
        let info = child.query_info()?;
        drop(child);

        if info.subkey_count > 0 || info.value_count > 0 {
            return Err(RegistryError::NotEmpty(name.to_string()));
        }
        self.registry.backend().delete_key(raw, name, self.view)
    }

    /// Deletes a child key and everything below it.
    ///
    /// Deleting a child that does not exist succeeds.
    #[instrument(skip(self))]
    pub fn delete_key(&self, name: &str) -> Result<()> {
        let raw = self.handle()?;
        delete_tree(&self.registry, raw, name, self.view)
    }

    /// Reads a dword. Four-byte binary values are accepted too.
    pub fn read_u32(&self, name: &str) -> Result<u32> {
        let (value_type, data) = self.read_raw(name)?;
        match value_type {
            ValueType::Dword | ValueType::Binary => decode_u32(&data)
                .ok_or_else(|| RegistryError::cant_read(name, format!("expected 4 bytes, found {}", data.len()))),
            other => Err(RegistryError::type_mismatch(name, "REG_DWORD", &other.name())),
        }
    }

    /// Reads a qword. Eight-byte binary values are accepted too.
    pub fn read_i64(&self, name: &str) -> Result<i64> {
        let (value_type, data) = self.read_raw(name)?;
        match value_type {
            ValueType::Qword | ValueType::Binary => decode_u64(&data)
                .map(|value| value as i64)
                .ok_or_else(|| RegistryError::cant_read(name, format!("expected 8 bytes, found {}", data.len()))),
            other => Err(RegistryError::type_mismatch(name, "REG_QWORD", &other.name())),
        }
    }

    /// Reads a string, expanding `%NAME%` placeholders in expandable strings.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if the stored or expanded string is longer than
    /// `RegistryConfig::max_string_len`; `TypeMismatch` for non-string types.
    pub fn read_string(&self, name: &str) -> Result<String> {
        let config = self.registry.config();
        let info = self.value_info(name)?;
        if !info.value_type.is_string() {
            return Err(RegistryError::type_mismatch(name, "REG_SZ", &info.value_type.name()));
        }

        let mut buf = vec![0u8; config.max_string_len * config.text_encoding.unit_size()];
        let info = self
            .registry
            .backend()
            .query_value(self.handle()?, name, Some(&mut buf))?;
        let raw = decode_string(&buf[..info.data_len], config.text_encoding);

        match info.value_type {
            ValueType::String => Ok(raw),
            ValueType::ExpandString => expand_environment_placeholders(
                &raw,
                self.registry.environment(),
                config.max_string_len,
                config.text_encoding,
            ),
            other => Err(RegistryError::type_mismatch(name, "REG_SZ", &other.name())),
        }
    }

    /// Reads a multi-string value.
    pub fn read_multi_string(&self, name: &str) -> Result<Vec<String>> {
        let (value_type, data) = self.read_raw(name)?;
        if value_type != ValueType::MultiString {
            return Err(RegistryError::type_mismatch(name, "REG_MULTI_SZ", &value_type.name()));
        }
        Ok(decode_multi_string(&data, self.registry.config().text_encoding))
    }

    /// Reads a value's type and raw bytes.
    pub fn read_raw(&self, name: &str) -> Result<(ValueType, Vec<u8>)> {
        let info = self.value_info(name)?;
        let mut data = vec![0u8; info.data_len];
        let info = self.read_raw_into(name, &mut data)?;
        data.truncate(info.data_len);
        Ok((info.value_type, data))
    }

    /// Reads a value into a caller-supplied buffer.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall { required }` if `buf` cannot hold the data.
    pub fn read_raw_into(&self, name: &str, buf: &mut [u8]) -> Result<ValueInfo> {
        self.registry.backend().query_value(self.handle()?, name, Some(buf))
    }

    /// Reads and decodes a value according to its stored type.
    pub fn read_value(&self, name: &str) -> Result<ValueData> {
        let (value_type, data) = self.read_raw(name)?;
        ValueData::parse(&data, value_type, self.registry.config().text_encoding)
    }

    /// Writes a dword.
    pub fn write_u32(&self, name: &str, value: u32) -> Result<()> {
        self.write_raw(name, ValueType::Dword, &encode_u32(value))
    }

    /// Writes a qword.
    pub fn write_i64(&self, name: &str, value: i64) -> Result<()> {
        self.write_raw(name, ValueType::Qword, &encode_u64(value as u64))
    }

    /// Writes a string.
    pub fn write_string(&self, name: &str, value: &str) -> Result<()> {
        let data = encode_string(value, self.registry.config().text_encoding);
        self.write_raw(name, ValueType::String, &data)
    }

    /// Writes an expandable string; placeholders are kept as written.
    pub fn write_expand_string(&self, name: &str, value: &str) -> Result<()> {
        let data = encode_string(value, self.registry.config().text_encoding);
        self.write_raw(name, ValueType::ExpandString, &data)
    }

    /// Writes a multi-string value.
    pub fn write_multi_string<S: AsRef<str>>(&self, name: &str, values: &[S]) -> Result<()> {
        let data = encode_multi_string(values, self.registry.config().text_encoding)?;
        self.write_raw(name, ValueType::MultiString, &data)
    }

    /// Writes raw bytes under the given type, creating or overwriting.
    pub fn write_raw(&self, name: &str, value_type: ValueType, data: &[u8]) -> Result<()> {
        self.registry.backend().set_value(self.handle()?, name, value_type, data)
    }

    /// Writes decoded value data.
    pub fn write_value(&self, name: &str, value: &ValueData) -> Result<()> {
        let (value_type, data) = value.encode(self.registry.config().text_encoding)?;
        self.write_raw(name, value_type, &data)
    }

    fn value_info(&self, name: &str) -> Result<ValueInfo> {
        self.registry.backend().query_value(self.handle()?, name, None)
    }

    fn handle(&self) -> Result<RawKey> {
        self.raw.ok_or_else(RegistryError::invalid_handle)
    }

    fn check_view(&self, access: Access) -> Result<()> {
        let requested = access.view()?;
        if requested != self.view {
            return Err(RegistryError::invalid_argument(format!(
                "view {:?} does not match the handle's view {:?}",
                requested, self.view
            )));
        }
        Ok(())
    }

    fn replace(&mut self, raw: RawKey, view: View) {
        self.close();
        self.raw = Some(raw);
        self.view = view;
    }

    fn adopt(&mut self, child: &mut RegKey) {
        let view = child.view;
        if let Some(raw) = child.take() {
            self.replace(raw, view);
        }
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;
    use crate::types::RootKey;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryRegistry>, Registry) {
        let store = Arc::new(MemoryRegistry::new());
        let registry = Registry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn test_empty_handle() {
        let (_, registry) = setup();
        let mut key = RegKey::new(&registry);
        assert!(!key.is_valid());
        assert_eq!(key.value_count(), 0);
        assert!(!key.has_value("x"));
        assert_eq!(key.read_u32("x"), Err(RegistryError::invalid_handle()));
        key.close();
        key.close();
    }

    #[test]
    fn test_drop_closes_handle() {
        let (store, registry) = setup();
        {
            let key = registry
                .create_key(RootKey::CurrentUser, "Scoped", Access::ALL_ACCESS)
                .unwrap();
            assert!(key.is_valid());
            assert_eq!(store.open_handle_count(), 1);
        }
        assert_eq!(store.open_handle_count(), 0);
    }

    #[test]
    fn test_take_transfers_ownership() {
        let (store, registry) = setup();
        let mut key = registry
            .create_key(RootKey::CurrentUser, "Taken", Access::ALL_ACCESS | Access::WOW64_64KEY)
            .unwrap();
        let raw = key.take().unwrap();
        assert!(!key.is_valid());
        assert_eq!(key.view(), View::Default);
        drop(key);
        assert_eq!(store.open_handle_count(), 1);

        let wrapped = RegKey::from_raw(&registry, raw, View::Wow64_64);
        assert_eq!(wrapped.view(), View::Wow64_64);
        drop(wrapped);
        assert_eq!(store.open_handle_count(), 0);
    }

    #[test]
    fn test_set_replaces_handle() {
        let (store, registry) = setup();
        let mut first = registry
            .create_key(RootKey::CurrentUser, "One", Access::ALL_ACCESS)
            .unwrap();
        let mut second = registry
            .create_key(RootKey::CurrentUser, "Two", Access::ALL_ACCESS)
            .unwrap();
        let raw = second.take().unwrap();
        first.set(raw, View::Default);
        assert_eq!(store.open_handle_count(), 1);
        assert_eq!(first.raw(), Some(raw));
    }

    #[test]
    fn test_open_key_descends_in_place() {
        let (store, registry) = setup();
        registry
            .create_key(RootKey::LocalMachine, "A\\B", Access::ALL_ACCESS)
            .unwrap();

        let mut key = registry.open_key(RootKey::LocalMachine, "A", Access::READ).unwrap();
        key.open_key("B", Access::READ).unwrap();
        assert!(key.is_valid());
        assert_eq!(store.open_handle_count(), 1);
        assert!(key.open_key("Missing", Access::READ).unwrap_err().is_not_found());
        assert!(key.is_valid());
    }

    #[test]
    fn test_read_i64_and_binary_fallback() {
        let (_, registry) = setup();
        let key = registry
            .create_key(RootKey::CurrentUser, "Numbers", Access::ALL_ACCESS)
            .unwrap();
        key.write_i64("big", -5).unwrap();
        assert_eq!(key.read_i64("big").unwrap(), -5);

        key.write_raw("bin4", ValueType::Binary, &[1, 0, 0, 0]).unwrap();
        assert_eq!(key.read_u32("bin4").unwrap(), 1);
        key.write_raw("bin3", ValueType::Binary, &[1, 0, 0]).unwrap();
        assert!(matches!(key.read_u32("bin3"), Err(RegistryError::CantRead { .. })));
        key.write_raw("short", ValueType::Dword, &[1, 0]).unwrap();
        assert!(matches!(key.read_u32("short"), Err(RegistryError::CantRead { .. })));
        assert!(matches!(key.read_i64("bin4"), Err(RegistryError::CantRead { .. })));
    }

    #[test]
    fn test_default_value() {
        let (_, registry) = setup();
        let key = registry
            .create_key(RootKey::ClassesRoot, ".txt", Access::ALL_ACCESS)
            .unwrap();
        key.write_string("", "txtfile").unwrap();
        assert_eq!(key.read_string("").unwrap(), "txtfile");
        assert_eq!(key.value_name_at(0).unwrap(), "");
        assert!(key.value_name_at(1).unwrap_err().is_not_found());
    }
}
