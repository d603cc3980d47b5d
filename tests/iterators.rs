//! Value and subkey cursors over the in-memory store.

use reg_access::{
    Access, Disposition, EnumKey, EnumValue, KeyInfo, MemoryRegistry, RawKey, Registry, RegistryBackend,
    RegistryConfig, RegistryError, RegistryKeyIterator, RegistryValueIterator, Result, RootKey, ValueInfo, ValueType,
    View,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A store whose enumeration never has room for the entry, however large
/// the buffers get.
#[derive(Default)]
struct AlwaysTooSmall {
    inner: MemoryRegistry,
    enum_key_calls: AtomicUsize,
    enum_value_calls: AtomicUsize,
}

impl RegistryBackend for AlwaysTooSmall {
    fn create_key(&self, parent: RawKey, path: &str, access: Access) -> Result<(RawKey, Disposition)> {
        self.inner.create_key(parent, path, access)
    }

    fn open_key(&self, parent: RawKey, path: &str, access: Access) -> Result<RawKey> {
        self.inner.open_key(parent, path, access)
    }

    fn close_key(&self, key: RawKey) -> Result<()> {
        self.inner.close_key(key)
    }

    fn query_info(&self, key: RawKey) -> Result<KeyInfo> {
        self.inner.query_info(key)
    }

    fn query_value(&self, key: RawKey, name: &str, data: Option<&mut [u8]>) -> Result<ValueInfo> {
        self.inner.query_value(key, name, data)
    }

    fn set_value(&self, key: RawKey, name: &str, value_type: ValueType, data: &[u8]) -> Result<()> {
        self.inner.set_value(key, name, value_type, data)
    }

    fn delete_value(&self, key: RawKey, name: &str) -> Result<()> {
        self.inner.delete_value(key, name)
    }

    fn delete_key(&self, parent: RawKey, path: &str, view: View) -> Result<()> {
        self.inner.delete_key(parent, path, view)
    }

    fn enum_key(&self, _key: RawKey, _index: u32, _name_capacity: usize) -> Result<Option<EnumKey>> {
        self.enum_key_calls.fetch_add(1, Ordering::SeqCst);
        Err(RegistryError::BufferTooSmall { required: 64 })
    }

    fn enum_value(
        &self,
        _key: RawKey,
        _index: u32,
        _name_capacity: usize,
        _data: Option<&mut [u8]>,
    ) -> Result<Option<EnumValue>> {
        self.enum_value_calls.fetch_add(1, Ordering::SeqCst);
        Err(RegistryError::BufferTooSmall { required: 64 })
    }
}

fn always_too_small() -> (Arc<AlwaysTooSmall>, Registry) {
    let store = Arc::new(AlwaysTooSmall::default());
    let registry = Registry::new(store.clone());
    let key = registry
        .create_key(RootKey::CurrentUser, "Short", Access::ALL_ACCESS)
        .unwrap();
    key.write_u32("only", 1).unwrap();
    key.create_child("Child", Access::ALL_ACCESS).unwrap();
    (store, registry)
}

#[test]
fn test_value_read_retries_once_then_fails() {
    let (store, registry) = always_too_small();

    let mut iter = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Short");
    assert_eq!(store.enum_value_calls.load(Ordering::SeqCst), 2);
    assert!(iter.is_valid());
    assert_eq!(iter.name(), "");
    assert!(iter.value().is_empty());
    assert_eq!(iter.value_type(), ValueType::None);

    assert!(!iter.read());
    assert_eq!(store.enum_value_calls.load(Ordering::SeqCst), 4);
    assert_eq!(iter.name(), "");

    assert!(iter.next().is_none());
    assert!(!iter.is_valid());
    assert_eq!(store.enum_value_calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_key_read_retries_once_then_fails() {
    let (store, registry) = always_too_small();

    let mut iter = RegistryKeyIterator::new(&registry, RootKey::CurrentUser, "Short");
    assert_eq!(store.enum_key_calls.load(Ordering::SeqCst), 2);
    assert!(iter.is_valid());
    assert_eq!(iter.name(), "");

    assert!(!iter.read());
    assert_eq!(store.enum_key_calls.load(Ordering::SeqCst), 4);
    assert_eq!(iter.name(), "");

    assert!(iter.next().is_none());
    assert!(!iter.is_valid());
    assert_eq!(store.enum_key_calls.load(Ordering::SeqCst), 4);

    drop(iter);
    assert_eq!(store.inner.open_handle_count(), 0);
}

#[test]
fn test_empty_key_is_invalid_immediately() {
    let registry = Registry::in_memory();
    registry
        .create_key(RootKey::CurrentUser, "Empty", Access::ALL_ACCESS)
        .unwrap();

    let mut iter = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Empty");
    assert!(!iter.is_valid());
    assert_eq!(iter.value_count(), 0);
    assert!(!iter.read());
    assert_eq!(iter.name(), "");
    assert!(iter.value().is_empty());
    assert_eq!(iter.value_type(), ValueType::None);
}

#[test]
fn test_each_value_visited_once_descending() {
    let registry = Registry::in_memory();
    let key = registry
        .create_key(RootKey::CurrentUser, "XYZ", Access::ALL_ACCESS)
        .unwrap();
    for name in ["x", "y", "z"] {
        key.write_string(name, name).unwrap();
    }
    assert!(key.has_value("y"));
    assert_eq!(key.value_count(), 3);

    let mut iter = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "XYZ");
    let mut seen = HashSet::new();
    let mut indices = Vec::new();
    while iter.is_valid() {
        assert!(seen.insert(iter.name().to_string()), "visited {} twice", iter.name());
        indices.push(iter.index());
        iter.advance();
    }

    assert_eq!(seen, HashSet::from(["x".to_string(), "y".to_string(), "z".to_string()]));
    assert_eq!(indices, [2, 1, 0]);
    assert!(!iter.read());
}

#[test]
fn test_value_entries_carry_data() {
    let registry = Registry::in_memory();
    let key = registry
        .create_key(RootKey::CurrentUser, "Entries", Access::ALL_ACCESS)
        .unwrap();
    key.write_u32("dword", 0x1234).unwrap();
    key.write_raw("blob", ValueType::Binary, &[1, 2, 3]).unwrap();

    let entries: Vec<_> = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Entries").collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "blob");
    assert_eq!(entries[0].data, [1, 2, 3]);
    assert_eq!(entries[1].value_type, ValueType::Dword);
    assert_eq!(entries[1].data, 0x1234u32.to_le_bytes());
}

#[test]
fn test_large_values_after_small_ones() {
    let registry = Registry::in_memory().with_config(RegistryConfig::default().with_initial_buffer_len(8));
    let key = registry
        .create_key(RootKey::CurrentUser, "Sizes", Access::ALL_ACCESS)
        .unwrap();
    key.write_raw("huge", ValueType::Binary, &vec![0xaa; 4096]).unwrap();
    key.write_raw("small", ValueType::Binary, &[1]).unwrap();
    key.write_raw(&"n".repeat(300), ValueType::Binary, &[2; 16]).unwrap();

    let sizes: Vec<usize> = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Sizes")
        .map(|entry| entry.data.len())
        .collect();
    assert_eq!(sizes, [16, 1, 4096]);
}

#[test]
fn test_read_only_handle_is_enough() {
    let store = Arc::new(MemoryRegistry::new());
    let registry = Registry::new(store.clone());
    registry
        .create_key(RootKey::CurrentUser, "Locked\\Child", Access::ALL_ACCESS)
        .unwrap()
        .write_u32("v", 1)
        .unwrap();
    store.set_read_only(RootKey::CurrentUser, "Locked", true).unwrap();

    assert_eq!(RegistryKeyIterator::new(&registry, RootKey::CurrentUser, "Locked").count(), 1);
    assert_eq!(
        RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Locked\\Child").count(),
        1
    );
}

#[test]
fn test_iterators_release_handles() {
    let store = Arc::new(MemoryRegistry::new());
    let registry = Registry::new(store.clone());
    registry
        .create_key(RootKey::CurrentUser, "Held\\A", Access::ALL_ACCESS)
        .unwrap();

    {
        let keys = RegistryKeyIterator::new(&registry, RootKey::CurrentUser, "Held");
        let values = RegistryValueIterator::new(&registry, RootKey::CurrentUser, "Held");
        assert!(keys.is_valid());
        assert!(!values.is_valid());
        assert_eq!(store.open_handle_count(), 2);
    }
    assert_eq!(store.open_handle_count(), 0);
}

#[test]
fn test_key_iterator_in_view() {
    let registry = Registry::in_memory();
    registry
        .create_key(RootKey::LocalMachine, "Software\\Only32", Access::ALL_ACCESS | View::Wow64_32)
        .unwrap();
    registry
        .create_key(RootKey::LocalMachine, "Software\\Only64", Access::ALL_ACCESS | View::Wow64_64)
        .unwrap();

    let names32: Vec<String> = RegistryKeyIterator::with_view(&registry, RootKey::LocalMachine, "Software", View::Wow64_32)
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names32, ["Only32"]);

    let mut iter64 = RegistryKeyIterator::with_view(&registry, RootKey::LocalMachine, "Software", View::Wow64_64);
    assert_eq!(iter64.subkey_count(), 2);
    let mut names64 = Vec::new();
    while iter64.is_valid() {
        names64.push(iter64.name().to_string());
        assert!(iter64.last_written() > 0);
        iter64.advance();
    }
    assert_eq!(names64, ["WOW6432Node", "Only64"]);
}
