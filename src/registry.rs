//! Module Registry
//!
//! Thread-safe map from module name to the context holding it. Names are
//! compared ASCII-case-insensitively; entries keep their own spelling.
//!
//! Readers get an `Arc` to the entry, so an in-flight resolve keeps its
//! context alive. Displaced entries are handed back to the caller, who
//! passes them to [`reclaim`] to wait out those readers and tear the
//! context down.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::utils::Backoff;
use parking_lot::RwLock;

use crate::context::IsolationContext;
use crate::module::LoadedModule;

/// One registered module
#[derive(Debug)]
pub struct RegistryEntry {
    name: String,
    context: IsolationContext,
}

impl RegistryEntry {
    /// Wrap a context; the entry is named after the module it holds.
    pub fn new(context: IsolationContext) -> Self {
        Self {
            name: context.module().name().to_string(),
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &IsolationContext {
        &self.context
    }

    pub fn module(&self) -> &LoadedModule {
        self.context.module()
    }
}

/// Registry of loaded modules
#[derive(Default)]
pub struct ModuleRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `entry`, returning the entry it displaced.
    ///
    /// The new entry is visible before this returns, and the old one is
    /// never torn down here.
    pub fn insert_or_replace(&self, entry: RegistryEntry) -> Option<Arc<RegistryEntry>> {
        let key = registry_key(entry.name());
        self.entries.write().insert(key, Arc::new(entry))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.write().remove(&registry_key(name))
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.read().get(&registry_key(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(&registry_key(name))
    }

    /// Registered module names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .values()
            .map(|entry| entry.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry
    pub fn drain(&self) -> Vec<Arc<RegistryEntry>> {
        self.entries.write().drain().map(|(_, entry)| entry).collect()
    }
}

fn registry_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Block until `entry` has no other holders, then tear its context down.
///
/// Must not be called while the calling thread itself still holds another
/// clone of the same entry.
pub fn reclaim(entry: Arc<RegistryEntry>) {
    let backoff = Backoff::new();
    let mut entry = entry;
    loop {
        match Arc::try_unwrap(entry) {
            Ok(owned) => {
                owned.context.teardown();
                return;
            }
            Err(shared) => {
                entry = shared;
                backoff.snooze();
            }
        }
    }
}
