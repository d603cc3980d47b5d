//! In-process registry backend.
//!
//! [`MemoryRegistry`] keeps the whole store in a node map behind an `RwLock`
//! and hands out numbered raw handles. It follows the store rules the access
//! layer depends on:
//!
//! - Key and value names compare case-insensitively (ASCII folding).
//! - Subkeys enumerate in folded-name order, values in insertion order.
//! - Deleting a key is atomic per node and refused while it has subkeys.
//! - Handles keep the rights they were opened with; a handle whose key has
//!   been deleted fails every call with `Unknown(1018)`.
//! - In the 32-bit view, keys registered with
//!   [`MemoryRegistry::with_redirected`] are transparently replaced by their
//!   `WOW6432Node` child.

use crate::access::{Access, View};
use crate::backend::{EnumKey, EnumValue, KeyInfo, RawKey, RegistryBackend, ValueInfo};
use crate::error::{RegistryError, Result};
use crate::types::{Disposition, RootKey, ValueType};
use crate::utils::{datetime_to_filetime, fold_name, split_path, PATH_SEPARATOR};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Name of the child that holds the 32-bit view of a redirected key.
pub const WOW64_NODE_NAME: &str = "WOW6432Node";

/// First raw handle value handed out for non-root keys.
const FIRST_HANDLE: u64 = 0x1000;

/// Handles stay below the predefined root range and wrap back to
/// `FIRST_HANDLE` when they reach it.
const HANDLE_LIMIT: u64 = 0x8000_0000;

type NodeId = u64;

#[derive(Debug, Clone)]
struct StoredValue {
    name: String,
    value_type: ValueType,
    data: Vec<u8>,
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    root: RootKey,
    path: String,
    children: BTreeMap<String, NodeId>,
    values: Vec<StoredValue>,
    last_written: u64,
    read_only: bool,
    redirected: bool,
}

impl Node {
    fn find_value(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|v| v.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenHandle {
    node: NodeId,
    access: Access,
}

#[derive(Debug)]
struct State {
    nodes: HashMap<NodeId, Node>,
    roots: BTreeMap<RootKey, NodeId>,
    handles: HashMap<u64, OpenHandle>,
    next_node: NodeId,
    next_handle: u64,
}

/// A resolved parent: the node a call starts from and the rights it carries.
#[derive(Debug, Clone, Copy)]
struct Resolved {
    node: NodeId,
    access: Access,
}

/// Registry backend held entirely in memory.
#[derive(Debug)]
pub struct MemoryRegistry {
    state: RwLock<State>,
    redirected: Vec<(RootKey, String)>,
}

impl MemoryRegistry {
    /// Creates an empty store with one key per predefined root and
    /// `HKEY_LOCAL_MACHINE\Software` redirected in the 32-bit view.
    pub fn new() -> Self {
        Self::with_redirected(vec![(RootKey::LocalMachine, "Software".to_string())])
    }

    /// Creates an empty store with the given redirected keys.
    ///
    /// Each entry names a key relative to a root; in the 32-bit view,
    /// stepping into that key lands in its `WOW6432Node` child instead.
    pub fn with_redirected(redirected: Vec<(RootKey, String)>) -> Self {
        let now = now_filetime();
        let mut nodes = HashMap::new();
        let mut roots = BTreeMap::new();
        for (id, root) in RootKey::ALL.into_iter().enumerate() {
            let id = id as NodeId;
            nodes.insert(
                id,
                Node {
                    name: root.name().to_string(),
                    parent: None,
                    root,
                    path: String::new(),
                    children: BTreeMap::new(),
                    values: Vec::new(),
                    last_written: now,
                    read_only: false,
                    redirected: false,
                },
            );
            roots.insert(root, id);
        }

        let redirected = redirected
            .into_iter()
            .map(|(root, path)| (root, normalize_path(&path)))
            .collect();

        Self {
            state: RwLock::new(State {
                next_node: nodes.len() as NodeId,
                nodes,
                roots,
                handles: HashMap::new(),
                next_handle: FIRST_HANDLE,
            }),
            redirected,
        }
    }

    /// Marks a key read-only (or writable again).
    ///
    /// Opening a read-only key with write rights, writing its values,
    /// creating children under it and deleting it all fail with
    /// `AccessDenied`.
    pub fn set_read_only(&self, root: RootKey, path: &str, read_only: bool) -> Result<()> {
        let mut state = self.write();
        let start = state.root_node(root);
        let node = self.walk(&mut state, start, path, View::Default, None)?.0;
        state.node_mut(node)?.read_only = read_only;
        Ok(())
    }

    /// Returns the number of raw handles currently open.
    pub fn open_handle_count(&self) -> usize {
        self.read().handles.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_redirected(&self, root: RootKey, path: &str) -> bool {
        let folded = fold_name(path);
        self.redirected.iter().any(|(r, p)| *r == root && *p == folded)
    }

    /// Walks `path` from `start`.
    ///
    /// With `create` set to the rights of the starting handle, missing
    /// segments are created; otherwise a missing segment is `NotFound`.
    /// Returns the final node and whether anything was created.
    fn walk(
        &self,
        state: &mut State,
        start: NodeId,
        path: &str,
        view: View,
        create: Option<Access>,
    ) -> Result<(NodeId, bool)> {
        let mut current = start;
        let mut created = false;

        for segment in split_path(path)? {
            current = self.step(state, current, segment, create, &mut created)?;
            if view == View::Wow64_32 && state.node(current)?.redirected {
                current = self.step(state, current, WOW64_NODE_NAME, create, &mut created)?;
            }
        }

        Ok((current, created))
    }

    fn step(
        &self,
        state: &mut State,
        parent: NodeId,
        segment: &str,
        create: Option<Access>,
        created: &mut bool,
    ) -> Result<NodeId> {
        let folded = fold_name(segment);
        let parent_node = state.node(parent)?;
        if let Some(&child) = parent_node.children.get(&folded) {
            return Ok(child);
        }

        let Some(access) = create else {
            return Err(RegistryError::not_found("key", segment));
        };
        if !access.contains(Access::CREATE_SUB_KEY) {
            return Err(RegistryError::access_denied("create subkey", &parent_node.name));
        }
        if parent_node.read_only {
            return Err(RegistryError::access_denied("create subkey", &parent_node.name));
        }

        let root = parent_node.root;
        let path = if parent_node.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}{}{}", parent_node.path, PATH_SEPARATOR, segment)
        };
        let redirected = self.is_redirected(root, &path);
        let now = now_filetime();

        let id = state.next_node;
        state.next_node += 1;
        state.nodes.insert(
            id,
            Node {
                name: segment.to_string(),
                parent: Some(parent),
                root,
                path,
                children: BTreeMap::new(),
                values: Vec::new(),
                last_written: now,
                read_only: false,
                redirected,
            },
        );
        let parent_node = state.node_mut(parent)?;
        parent_node.children.insert(folded, id);
        parent_node.last_written = now;
        *created = true;

        trace!(node = id, name = segment, "Created key node");
        Ok(id)
    }

    fn open_handle(&self, state: &mut State, node: NodeId, access: Access) -> RawKey {
        let mut raw = state.next_handle;
        while state.handles.contains_key(&raw) {
            raw = next_raw_handle(raw);
        }
        state.next_handle = next_raw_handle(raw);
        state.handles.insert(raw, OpenHandle { node, access });
        debug!(handle = %format!("{:#x}", raw), node, "Opened handle");
        RawKey(raw)
    }
}

fn next_raw_handle(raw: u64) -> u64 {
    if raw + 4 >= HANDLE_LIMIT {
        FIRST_HANDLE
    } else {
        raw + 4
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn root_node(&self, root: RootKey) -> NodeId {
        // Every root is inserted at construction and never removed.
        self.roots.get(&root).copied().unwrap_or_default()
    }

    fn resolve(&self, key: RawKey) -> Result<Resolved> {
        if let Some(root) = RootKey::from_raw(key) {
            return Ok(Resolved {
                node: self.root_node(root),
                access: Access::ALL_ACCESS,
            });
        }
        let handle = self.handles.get(&key.0).ok_or_else(RegistryError::invalid_handle)?;
        if !self.nodes.contains_key(&handle.node) {
            return Err(RegistryError::key_deleted());
        }
        Ok(Resolved {
            node: handle.node,
            access: handle.access,
        })
    }

    fn resolve_with(&self, key: RawKey, right: Access, operation: &str) -> Result<Resolved> {
        let resolved = self.resolve(key)?;
        if !resolved.access.contains(right) {
            let name = self.node(resolved.node)?.name.clone();
            return Err(RegistryError::access_denied(operation, &name));
        }
        Ok(resolved)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(RegistryError::key_deleted)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or_else(RegistryError::key_deleted)
    }
}

impl RegistryBackend for MemoryRegistry {
    fn create_key(&self, parent: RawKey, path: &str, access: Access) -> Result<(RawKey, Disposition)> {
        let view = access.view()?;
        let mut state = self.write();
        let start = state.resolve(parent)?;

        let (node, created) = self.walk(&mut state, start.node, path, view, Some(start.access))?;
        if access.wants_write() && state.node(node)?.read_only {
            return Err(RegistryError::access_denied("open for write", path));
        }

        let raw = self.open_handle(&mut state, node, access.rights());
        let disposition = if created {
            Disposition::CreatedNewKey
        } else {
            Disposition::OpenedExistingKey
        };
        Ok((raw, disposition))
    }

    fn open_key(&self, parent: RawKey, path: &str, access: Access) -> Result<RawKey> {
        let view = access.view()?;
        let mut state = self.write();
        let start = state.resolve(parent)?;

        let (node, _) = self.walk(&mut state, start.node, path, view, None)?;
        if access.wants_write() && state.node(node)?.read_only {
            return Err(RegistryError::access_denied("open for write", path));
        }

        Ok(self.open_handle(&mut state, node, access.rights()))
    }

    fn close_key(&self, key: RawKey) -> Result<()> {
        if RootKey::from_raw(key).is_some() {
            return Ok(());
        }
        let mut state = self.write();
        match state.handles.remove(&key.0) {
            Some(_) => {
                debug!(handle = ?key, "Closed handle");
                Ok(())
            }
            None => Err(RegistryError::invalid_handle()),
        }
    }

    fn query_info(&self, key: RawKey) -> Result<KeyInfo> {
        let state = self.read();
        let resolved = state.resolve_with(key, Access::QUERY_VALUE, "query info")?;
        let node = state.node(resolved.node)?;

        let mut info = KeyInfo {
            subkey_count: node.children.len() as u32,
            value_count: node.values.len() as u32,
            last_written: node.last_written,
            ..KeyInfo::default()
        };
        for child in node.children.values() {
            let len = state.node(*child)?.name.chars().count() as u32;
            info.max_subkey_name_len = info.max_subkey_name_len.max(len);
        }
        for value in &node.values {
            info.max_value_name_len = info.max_value_name_len.max(value.name.chars().count() as u32);
            info.max_value_data_len = info.max_value_data_len.max(value.data.len() as u32);
        }
        Ok(info)
    }

    fn query_value(&self, key: RawKey, name: &str, data: Option<&mut [u8]>) -> Result<ValueInfo> {
        let state = self.read();
        let resolved = state.resolve_with(key, Access::QUERY_VALUE, "query value")?;
        let node = state.node(resolved.node)?;
        let index = node
            .find_value(name)
            .ok_or_else(|| RegistryError::not_found("value", name))?;
        let value = &node.values[index];

        let info = ValueInfo {
            value_type: value.value_type,
            data_len: value.data.len(),
        };
        if let Some(buf) = data {
            if buf.len() < value.data.len() {
                return Err(RegistryError::BufferTooSmall {
                    required: value.data.len(),
                });
            }
            buf[..value.data.len()].copy_from_slice(&value.data);
        }
        Ok(info)
    }

    fn set_value(&self, key: RawKey, name: &str, value_type: ValueType, data: &[u8]) -> Result<()> {
        let mut state = self.write();
        let resolved = state.resolve_with(key, Access::SET_VALUE, "set value")?;
        let node = state.node_mut(resolved.node)?;
        if node.read_only {
            return Err(RegistryError::access_denied("set value", &node.name));
        }

        let stored = StoredValue {
            name: name.to_string(),
            value_type,
            data: data.to_vec(),
        };
        match node.find_value(name) {
            Some(index) => node.values[index] = stored,
            None => node.values.push(stored),
        }
        node.last_written = now_filetime();
        Ok(())
    }

    fn delete_value(&self, key: RawKey, name: &str) -> Result<()> {
        let mut state = self.write();
        let resolved = state.resolve_with(key, Access::SET_VALUE, "delete value")?;
        let node = state.node_mut(resolved.node)?;
        if node.read_only {
            return Err(RegistryError::access_denied("delete value", &node.name));
        }

        let index = node
            .find_value(name)
            .ok_or_else(|| RegistryError::not_found("value", name))?;
        node.values.remove(index);
        node.last_written = now_filetime();
        Ok(())
    }

    fn delete_key(&self, parent: RawKey, path: &str, view: View) -> Result<()> {
        if split_path(path)?.is_empty() {
            return Err(RegistryError::invalid_argument("cannot delete a key through an empty path"));
        }

        let mut state = self.write();
        let start = state.resolve(parent)?;
        let (target, _) = self.walk(&mut state, start.node, path, view, None)?;
        let node = state.node(target)?;
        if node.parent.is_none() || node.read_only {
            return Err(RegistryError::access_denied("delete", path));
        }
        if !node.children.is_empty() {
            return Err(RegistryError::NotEmpty(path.to_string()));
        }

        let folded = fold_name(&node.name);
        if let Some(parent_id) = node.parent {
            let parent_node = state.node_mut(parent_id)?;
            parent_node.children.remove(&folded);
            parent_node.last_written = now_filetime();
        }
        state.nodes.remove(&target);

        debug!(path, node = target, "Deleted key node");
        Ok(())
    }

    fn enum_key(&self, key: RawKey, index: u32, name_capacity: usize) -> Result<Option<EnumKey>> {
        let state = self.read();
        let resolved = state.resolve_with(key, Access::ENUMERATE_SUB_KEYS, "enumerate subkeys")?;
        let node = state.node(resolved.node)?;

        let Some(child) = node.children.values().nth(index as usize) else {
            return Ok(None);
        };
        let child = state.node(*child)?;
        let required = child.name.chars().count() + 1;
        if required > name_capacity {
            return Err(RegistryError::BufferTooSmall { required });
        }

        Ok(Some(EnumKey {
            name: child.name.clone(),
            last_written: child.last_written,
        }))
    }

    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name_capacity: usize,
        data: Option<&mut [u8]>,
    ) -> Result<Option<EnumValue>> {
        let state = self.read();
        let resolved = state.resolve_with(key, Access::QUERY_VALUE, "enumerate values")?;
        let node = state.node(resolved.node)?;

        let Some(value) = node.values.get(index as usize) else {
            return Ok(None);
        };
        let name_fits = value.name.chars().count() < name_capacity;
        let capacity = data.as_ref().map_or(value.data.len(), |buf| buf.len());
        if !name_fits || capacity < value.data.len() {
            return Err(RegistryError::BufferTooSmall {
                required: value.data.len().max(capacity),
            });
        }

        if let Some(buf) = data {
            buf[..value.data.len()].copy_from_slice(&value.data);
        }
        Ok(Some(EnumValue {
            name: value.name.clone(),
            value_type: value.value_type,
            data_len: value.data.len(),
        }))
    }
}

fn now_filetime() -> u64 {
    datetime_to_filetime(Utc::now())
}

fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect();
    fold_name(&segments.join("\\"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HKLM: RawKey = RawKey(0x8000_0002);

    #[test]
    fn test_create_then_open() {
        let registry = MemoryRegistry::new();
        let (key, disposition) = registry.create_key(HKLM, "A\\B", Access::ALL_ACCESS).unwrap();
        assert_eq!(disposition, Disposition::CreatedNewKey);
        registry.close_key(key).unwrap();

        let (key, disposition) = registry.create_key(HKLM, "a\\b", Access::ALL_ACCESS).unwrap();
        assert_eq!(disposition, Disposition::OpenedExistingKey);
        registry.close_key(key).unwrap();

        let key = registry.open_key(HKLM, "A", Access::READ).unwrap();
        assert_eq!(registry.query_info(key).unwrap().subkey_count, 1);
        registry.close_key(key).unwrap();
        assert_eq!(registry.open_handle_count(), 0);
    }

    #[test]
    fn test_handles_wrap_below_root_range() {
        let registry = MemoryRegistry::new();
        let (first, _) = registry.create_key(HKLM, "Wrap", Access::ALL_ACCESS).unwrap();
        assert_eq!(first.0, FIRST_HANDLE);
        registry.write().next_handle = HANDLE_LIMIT - 4;

        let last = registry.open_key(HKLM, "Wrap", Access::READ).unwrap();
        let wrapped = registry.open_key(HKLM, "Wrap", Access::READ).unwrap();
        assert_eq!(last.0, HANDLE_LIMIT - 4);
        // FIRST_HANDLE is still open, so the next free slot is taken
        assert_eq!(wrapped.0, FIRST_HANDLE + 4);

        for key in [first, last, wrapped] {
            assert!(RootKey::from_raw(key).is_none());
            registry.close_key(key).unwrap();
        }
        assert!(registry.query_info(HKLM).is_ok());
        assert_eq!(registry.open_handle_count(), 0);
    }

    #[test]
    fn test_open_missing() {
        let registry = MemoryRegistry::new();
        assert!(registry.open_key(HKLM, "Missing", Access::READ).unwrap_err().is_not_found());
    }

    #[test]
    fn test_close_unknown_handle() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.close_key(RawKey(0x1234)), Err(RegistryError::invalid_handle()));
        assert!(registry.close_key(HKLM).is_ok());
    }

    #[test]
    fn test_rights_enforced() {
        let registry = MemoryRegistry::new();
        let (key, _) = registry.create_key(HKLM, "R", Access::ALL_ACCESS).unwrap();
        registry.set_value(key, "v", ValueType::Dword, &[1, 0, 0, 0]).unwrap();
        registry.close_key(key).unwrap();

        let key = registry.open_key(HKLM, "R", Access::QUERY_VALUE).unwrap();
        assert!(matches!(
            registry.set_value(key, "v", ValueType::Dword, &[2, 0, 0, 0]),
            Err(RegistryError::AccessDenied(_))
        ));
        assert!(matches!(registry.enum_key(key, 0, 256), Err(RegistryError::AccessDenied(_))));
        assert_eq!(registry.query_value(key, "V", None).unwrap().data_len, 4);
        registry.close_key(key).unwrap();
    }

    #[test]
    fn test_read_only_key() {
        let registry = MemoryRegistry::new();
        let (key, _) = registry.create_key(HKLM, "Locked", Access::ALL_ACCESS).unwrap();
        registry.close_key(key).unwrap();
        registry.set_read_only(RootKey::LocalMachine, "Locked", true).unwrap();

        assert!(matches!(
            registry.open_key(HKLM, "Locked", Access::WRITE),
            Err(RegistryError::AccessDenied(_))
        ));
        assert!(matches!(
            registry.create_key(HKLM, "Locked\\Child", Access::ALL_ACCESS),
            Err(RegistryError::AccessDenied(_))
        ));
        assert!(matches!(
            registry.delete_key(HKLM, "Locked", View::Default),
            Err(RegistryError::AccessDenied(_))
        ));
        assert!(registry.open_key(HKLM, "Locked", Access::READ).is_ok());
    }

    #[test]
    fn test_delete_key_rules() {
        let registry = MemoryRegistry::new();
        let (key, _) = registry.create_key(HKLM, "P\\C", Access::ALL_ACCESS).unwrap();

        assert!(matches!(
            registry.delete_key(HKLM, "P", View::Default),
            Err(RegistryError::NotEmpty(_))
        ));
        registry.delete_key(HKLM, "P\\C", View::Default).unwrap();
        assert_eq!(registry.query_info(key), Err(RegistryError::key_deleted()));
        registry.close_key(key).unwrap();

        registry.delete_key(HKLM, "P", View::Default).unwrap();
        assert!(registry.delete_key(HKLM, "P", View::Default).unwrap_err().is_not_found());
        assert!(registry.delete_key(HKLM, "", View::Default).is_err());
    }

    #[test]
    fn test_wow64_redirection() {
        let registry = MemoryRegistry::new();
        let access = Access::ALL_ACCESS | Access::WOW64_32KEY;
        let (key, _) = registry.create_key(HKLM, "Software\\Vendor", access).unwrap();
        registry.close_key(key).unwrap();

        assert!(registry.open_key(HKLM, "Software\\Vendor", Access::READ).is_err());
        let key = registry
            .open_key(HKLM, "Software\\WOW6432Node\\Vendor", Access::READ)
            .unwrap();
        registry.close_key(key).unwrap();
        let key = registry.open_key(HKLM, "Software\\Vendor", access).unwrap();
        registry.close_key(key).unwrap();
    }

    #[test]
    fn test_enum_buffers() {
        let registry = MemoryRegistry::new();
        let (key, _) = registry.create_key(HKLM, "E", Access::ALL_ACCESS).unwrap();
        registry.set_value(key, "big", ValueType::Binary, &[7u8; 32]).unwrap();

        let mut small = [0u8; 8];
        assert_eq!(
            registry.enum_value(key, 0, 256, Some(&mut small[..])),
            Err(RegistryError::BufferTooSmall { required: 32 })
        );
        let mut large = [0u8; 32];
        let value = registry.enum_value(key, 0, 256, Some(&mut large[..])).unwrap().unwrap();
        assert_eq!(value.name, "big");
        assert_eq!(value.data_len, 32);
        assert_eq!(large, [7u8; 32]);
        assert_eq!(registry.enum_value(key, 1, 256, None).unwrap(), None);
        assert_eq!(registry.enum_value(key, 0, 3, None), Err(RegistryError::BufferTooSmall { required: 32 }));
        assert_eq!(registry.enum_value(key, 0, 4, None).unwrap().unwrap().data_len, 32);
        registry.close_key(key).unwrap();
    }
}
