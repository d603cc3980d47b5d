//! Serializable snapshots of a key subtree.
//!
//! [`export`] walks a key with the value and subkey iterators and captures
//! every value with its type tag; [`import`] writes a snapshot back under any
//! parent. Value data is stored hex encoded so the JSON form is lossless for
//! every type, including binary and unknown tags.
//!
//! # Examples
//!
//! ```rust
//! use reg_access::snapshot::{export, import, KeySnapshot};
//! use reg_access::{Access, Registry, RootKey, View};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Registry::in_memory();
//! let key = source.create_key(RootKey::CurrentUser, "App\\Settings", Access::ALL_ACCESS)?;
//! key.write_u32("Width", 800)?;
//!
//! let json = export(&source, RootKey::CurrentUser, "App", View::Default)?.to_json()?;
//!
//! let target = Registry::in_memory();
//! import(&target, RootKey::CurrentUser, "App", &KeySnapshot::from_json(&json)?, View::Default)?;
//! let copy = target.open_key(RootKey::CurrentUser, "App\\Settings", Access::READ)?;
//! assert_eq!(copy.read_u32("Width")?, 800);
//! # Ok(())
//! # }
//! ```

use crate::access::{Access, View};
use crate::backend::RawKey;
use crate::codec::ValueData;
use crate::config::TextEncoding;
use crate::error::{RegistryError, Result};
use crate::iter::{RegistryKeyIterator, RegistryValueIterator, ValueEntry};
use crate::key::RegKey;
use crate::registry::Registry;
use crate::types::ValueType;
use crate::utils::{join_path, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A value captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    /// Value name; empty for the default value.
    pub name: String,

    /// Stored type tag.
    pub value_type: ValueType,

    /// Hex-encoded value bytes.
    pub data: String,
}

impl ValueSnapshot {
    /// Decodes the hex payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the payload is not valid hex.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.data)
            .map_err(|e| RegistryError::invalid_argument(format!("value '{}' has bad hex data: {}", self.name, e)))
    }

    /// Decodes the payload according to its type tag.
    pub fn decode(&self, encoding: TextEncoding) -> Result<ValueData> {
        ValueData::parse(&self.bytes()?, self.value_type, encoding)
    }
}

impl From<ValueEntry> for ValueSnapshot {
    fn from(entry: ValueEntry) -> Self {
        Self {
            name: entry.name,
            value_type: entry.value_type,
            data: hex::encode(entry.data),
        }
    }
}

/// A key with its values and subkeys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySnapshot {
    /// Key name (last path segment).
    pub name: String,

    /// Values in native index order.
    #[serde(default)]
    pub values: Vec<ValueSnapshot>,

    /// Subkeys in native index order.
    #[serde(default)]
    pub subkeys: Vec<KeySnapshot>,
}

impl KeySnapshot {
    /// Renders the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a snapshot from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Looks up a direct subkey by name, ignoring ASCII case.
    pub fn subkey(&self, name: &str) -> Option<&KeySnapshot> {
        self.subkeys.iter().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a value by name, ignoring ASCII case.
    pub fn value(&self, name: &str) -> Option<&ValueSnapshot> {
        self.values.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Counts this key and every key below it.
    pub fn key_count(&self) -> usize {
        1 + self.subkeys.iter().map(KeySnapshot::key_count).sum::<usize>()
    }
}

/// Captures `path` under `parent` and everything below it.
///
/// # Errors
///
/// `NotFound` or `AccessDenied` if the top key cannot be opened for reading.
/// Subkeys that disappear or cannot be read during the walk are skipped.
#[instrument(skip(registry, parent))]
pub fn export(registry: &Registry, parent: impl Into<RawKey>, path: &str, view: View) -> Result<KeySnapshot> {
    let parent = parent.into();
    // Surfaces open failures that the iterators would swallow.
    drop(registry.open_key(parent, path, Access::READ | view)?);

    let name = path
        .rsplit(PATH_SEPARATOR)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();
    let snapshot = export_key(registry, parent, path, name, view);
    debug!(keys = snapshot.key_count(), "Exported subtree");
    Ok(snapshot)
}

fn export_key(registry: &Registry, parent: RawKey, path: &str, name: String, view: View) -> KeySnapshot {
    let mut values: Vec<ValueSnapshot> = RegistryValueIterator::with_view(registry, parent, path, view)
        .map(ValueSnapshot::from)
        .collect();
    values.reverse();

    let mut children: Vec<String> = RegistryKeyIterator::with_view(registry, parent, path, view)
        .map(|entry| entry.name)
        .collect();
    children.reverse();

    let subkeys = children
        .into_iter()
        .map(|child| {
            let child_path = join_path(path, &child);
            export_key(registry, parent, &child_path, child, view)
        })
        .collect();

    KeySnapshot { name, values, subkeys }
}

/// Writes `snapshot` at `path` under `parent`, creating keys as needed.
///
/// Existing values with the same names are overwritten; anything else
/// already under `path` is left alone. The snapshot's own top-level name is
/// ignored in favor of `path`.
///
/// # Errors
///
/// Stops at the first key that cannot be created or value that cannot be
/// written; keys written before that remain.
#[instrument(skip(registry, parent, snapshot), fields(keys = snapshot.key_count()))]
pub fn import(
    registry: &Registry,
    parent: impl Into<RawKey>,
    path: &str,
    snapshot: &KeySnapshot,
    view: View,
) -> Result<()> {
    let key = registry.create_key(parent, path, Access::ALL_ACCESS | view)?;

    let mut stack: Vec<(RegKey, &KeySnapshot)> = vec![(key, snapshot)];
    while let Some((key, node)) = stack.pop() {
        for value in &node.values {
            key.write_raw(&value.name, value.value_type, &value.bytes()?)?;
        }
        for child in &node.subkeys {
            stack.push((key.create_child(&child.name, Access::ALL_ACCESS | view)?, child));
        }
    }
    Ok(())
}
