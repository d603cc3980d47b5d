//! Whole-subtree deletion.
//!
//! A store only deletes keys without subkeys, so a subtree is removed
//! bottom-up: try the key directly, and if that fails open it, delete the
//! subkey at index 0 until none remain, then try the key again. The walk
//! keeps its own stack of open keys instead of recursing, so the depth of
//! the tree does not bound the call stack.
//!
//! Deletion is not atomic. If a subkey cannot be removed the walk stops at
//! that level and the parent's retried delete reports the failure; whatever
//! was already deleted stays deleted.

use crate::access::{Access, View};
use crate::backend::RawKey;
use crate::error::{RegistryError, Result};
use crate::key::RegKey;
use crate::registry::Registry;
use crate::utils::{join_path, split_path, MAX_KEY_NAME_LEN};
use tracing::{debug, instrument, trace};

/// A key whose subkeys are being removed.
struct Frame {
    path: String,
    key: RegKey,
}

enum Step {
    /// The key is gone (deleted now, or already absent).
    Deleted,
    /// The key still has subkeys; it is open for enumeration.
    Descend(RegKey),
}

/// Deletes `name` under `parent` together with every key below it.
///
/// `name` may be a multi-segment path. All lookups happen in `view`. A key
/// that does not exist counts as deleted, so calling this twice succeeds
/// both times.
///
/// # Errors
///
/// `InvalidArgument` for an empty `name`. Otherwise the status of the last
/// delete attempted on the failing level, typically `AccessDenied` or
/// `NotEmpty` when part of the subtree could not be removed.
#[instrument(skip(registry))]
pub fn delete_tree(registry: &Registry, parent: RawKey, name: &str, view: View) -> Result<()> {
    if split_path(name)?.is_empty() {
        return Err(RegistryError::invalid_argument("cannot delete a tree through an empty path"));
    }

    let mut stack = match try_delete(registry, parent, name, view)? {
        Step::Deleted => return Ok(()),
        Step::Descend(key) => vec![Frame {
            path: name.to_string(),
            key,
        }],
    };

    let mut last = Ok(());
    while let Some(frame) = stack.last() {
        let child = if last.is_ok() { first_subkey(registry, &frame.key) } else { None };

        match child {
            Some(child) => {
                let path = join_path(&frame.path, &child);
                trace!(path = %path, "Descending");
                match try_delete(registry, parent, &path, view) {
                    Ok(Step::Deleted) => last = Ok(()),
                    Ok(Step::Descend(key)) => stack.push(Frame { path, key }),
                    Err(e) => last = Err(e),
                }
            }
            None => {
                if let Some(Frame { path, key }) = stack.pop() {
                    drop(key);
                    last = registry.backend().delete_key(parent, &path, view);
                    debug!(path = %path, ok = last.is_ok(), "Retried delete");
                }
            }
        }
    }

    last
}

fn try_delete(registry: &Registry, parent: RawKey, path: &str, view: View) -> Result<Step> {
    match registry.backend().delete_key(parent, path, view) {
        Ok(()) => return Ok(Step::Deleted),
        Err(e) => trace!(path, error = %e, "Direct delete failed"),
    }

    let mut key = RegKey::new(registry);
    match key.open(parent, path, Access::ENUMERATE_SUB_KEYS | view) {
        Ok(()) => Ok(Step::Descend(key)),
        Err(e) if e.is_not_found() => Ok(Step::Deleted),
        Err(e) => Err(e),
    }
}

/// Name of the subkey at index 0; any failure ends enumeration.
fn first_subkey(registry: &Registry, key: &RegKey) -> Option<String> {
    let raw = key.raw()?;
    match registry.backend().enum_key(raw, 0, MAX_KEY_NAME_LEN + 1) {
        Ok(entry) => entry.map(|entry| entry.name),
        Err(e) => {
            debug!(error = %e, "Subkey enumeration stopped");
            None
        }
    }
}
