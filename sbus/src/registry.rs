//! Interface registry: object path → set of interfaces, with subtree
//! fallback lookup (spec.md section 4.B).
//!
//! Grounded in `sbus_opath_hash_add_iface` / `sbus_opath_hash_lookup_iface`
//! / `sbus_opath_hash_lookup_supported` in
//! `original_source/src/sbus/sssd_dbus_interface.c`, and in the
//! `ArcMap`/`ObjectPath`/`Tree` shape of `dbus-tree/src/objectpath.rs`.
//! Where the C keeps a talloc-owned `hash_table_t` of
//! `sbus_interface_list`s with a delete callback firing per removed hash
//! entry, this keeps a `BTreeMap<String, Entry>` and a removal callback
//! supplied at construction (see [`Registry::new`]).

use crate::error::RegistryError;
use crate::iface::{Interface, InstanceData};
use crate::path::parent_subtrees;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of [`Registry::insert`] that matters to the caller: whether the
/// transport already has a registration at this path (`Extended`) or needs
/// one created (`Fresh`). See spec.md section 4.C step 3/4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Fresh,
    Extended,
}

/// One registry entry: the interfaces registered exactly at a path,
/// insertion-ordered (spec.md section 4.B: "Insertion order is preserved
/// within one entry for enumeration").
#[derive(Default, Clone)]
struct Entry {
    ifaces: Vec<(Arc<Interface>, InstanceData)>,
}

impl Entry {
    fn contains(&self, name: &str) -> bool {
        self.ifaces.iter().any(|(i, _)| i.name() == name)
    }

    fn get(&self, name: &str) -> Option<(Arc<Interface>, InstanceData)> {
        self.ifaces
            .iter()
            .find(|(i, _)| i.name() == name)
            .map(|(i, d)| (i.clone(), d.clone()))
    }
}

type DeleteCallback = dyn Fn(&str) + Send + Sync;

/// The keyed mapping from object-path string to interface list. Entries own
/// their interfaces; a delete callback runs on every entry removal and is
/// expected to unregister the path from the underlying transport (invariant
/// 2, spec.md section 3) — wired up by [`crate::connection::Connection`].
pub struct Registry {
    entries: BTreeMap<String, Entry>,
    on_delete: Option<Arc<DeleteCallback>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            entries: BTreeMap::new(),
            on_delete: None,
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Same registry, but with a delete callback that fires (path) for
    /// every entry removed, regardless of cause (spec.md section 3).
    pub fn with_delete_callback<F: Fn(&str) + Send + Sync + 'static>(callback: F) -> Self {
        Registry {
            entries: BTreeMap::new(),
            on_delete: Some(Arc::new(callback)),
        }
    }

    /// Inserts `interface` at `path`. Returns `Fresh` if this is the first
    /// interface at a brand-new entry, `Extended` if the entry already
    /// existed and gained an interface, or a `Duplicate` error if the
    /// interface's name was already registered there — idempotent
    /// double-register is an error, not silently accepted (spec.md 4.B).
    pub fn insert(
        &mut self,
        path: &str,
        interface: Arc<Interface>,
        instance_data: InstanceData,
    ) -> Result<InsertOutcome, RegistryError> {
        match self.entries.get_mut(path) {
            None => {
                let mut entry = Entry::default();
                entry.ifaces.push((interface, instance_data));
                self.entries.insert(path.to_string(), entry);
                Ok(InsertOutcome::Fresh)
            }
            Some(entry) => {
                if entry.contains(interface.name()) {
                    return Err(RegistryError::Duplicate {
                        path: path.to_string(),
                        iface: interface.name().to_string(),
                    });
                }
                entry.ifaces.push((interface, instance_data));
                Ok(InsertOutcome::Extended)
            }
        }
    }

    /// Exact-key existence check — does *not* walk ancestor subtrees.
    pub fn has(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Whether `path` resolves to *any* registered interface, directly or
    /// through an ancestor subtree fallback. Used by the dispatcher to tell
    /// "object genuinely doesn't exist" from "object exists, interface
    /// doesn't" (spec.md section 6: `UnknownObject` vs `UnknownInterface`).
    pub fn has_supported(&self, path: &str) -> bool {
        self.has(path) || parent_subtrees(path).any(|ancestor| self.has(&ancestor))
    }

    /// Tries `path` itself, then each ancestor subtree path in order,
    /// returning the first interface named `iface_name` it finds. Nearest
    /// registration wins (spec.md section 8, property 2).
    pub fn lookup_iface(&self, path: &str, iface_name: &str) -> Option<(Arc<Interface>, InstanceData)> {
        if let Some(entry) = self.entries.get(path) {
            if let Some(found) = entry.get(iface_name) {
                return Some(found);
            }
        }
        for ancestor in parent_subtrees(path) {
            if let Some(entry) = self.entries.get(&ancestor) {
                if let Some(found) = entry.get(iface_name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Unions, in ancestor order (nearest first), every interface registered
    /// at `path` or any ancestor subtree, deduplicated by name, keeping the
    /// nearest occurrence.
    pub fn lookup_supported(&self, path: &str) -> Vec<Arc<Interface>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut visit = |entry: &Entry, out: &mut Vec<Arc<Interface>>| {
            for (iface, _) in &entry.ifaces {
                if seen.insert(iface.name().to_string()) {
                    out.push(iface.clone());
                }
            }
        };
        if let Some(entry) = self.entries.get(path) {
            visit(entry, &mut out);
        }
        for ancestor in parent_subtrees(path) {
            if let Some(entry) = self.entries.get(&ancestor) {
                visit(entry, &mut out);
            }
        }
        out
    }

    /// Direct child path segments of `path` among all registered keys, for
    /// introspection's `<node name="..">` children (spec.md section 4's
    /// introspection support; grounded in `Tree::children` in
    /// `dbus-tree/src/objectpath.rs`).
    pub fn children_of(&self, path: &str) -> Vec<String> {
        let base = crate::path::base_of(path);
        let prefix = if base == "/" {
            "/".to_string()
        } else {
            format!("{}/", base)
        };
        let mut out = std::collections::BTreeSet::new();
        for key in self.entries.keys() {
            let key_base = crate::path::base_of(key);
            if key_base == base {
                continue;
            }
            if let Some(rest) = key_base.strip_prefix(&prefix) {
                if let Some(first) = rest.split('/').next() {
                    if !first.is_empty() {
                        out.insert(first.to_string());
                    }
                }
            }
        }
        out.into_iter().collect()
    }

    /// All registered paths, for re-registration after a reconnect
    /// (spec.md section 4.C: `reregister_all`).
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Removes the entry at `path` entirely, firing the delete callback if
    /// one was configured. Transport errors during the callback are the
    /// caller's concern to log; the entry is removed from the in-memory
    /// registry regardless (spec.md section 4.B: "Failure modes").
    pub fn remove(&mut self, path: &str) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            if let Some(cb) = &self.on_delete {
                cb(path);
            }
        }
        removed
    }
}
