//! Load, Replace and Unload

use std::path::Path;

use tracing::info;

use super::ModuleHost;
use crate::context::IsolationContext;
use crate::error::{HostError, HostResult, NotFoundKind};
use crate::registry::{reclaim, RegistryEntry};

impl ModuleHost {
    /// Load the module at `path` into a fresh context and register it under
    /// its canonical name, which is returned.
    ///
    /// A module already registered under that name is replaced. The old
    /// context is torn down only after the new entry is visible.
    pub fn load(&self, path: impl AsRef<Path>) -> HostResult<String> {
        let path = path.as_ref();
        if path.to_string_lossy().trim().is_empty() {
            return Err(HostError::InvalidArgument("module path is empty".to_string()));
        }

        let context = IsolationContext::open(&self.opener, path)?;
        let entry = RegistryEntry::new(context);
        let name = entry.name().to_string();
        let token = entry.context().token();
        let context_name = entry.context().name().to_string();

        match self.registry.insert_or_replace(entry) {
            Some(old) => {
                let old_token = old.context().token();
                reclaim(old);
                info!(module = %name, context = %context_name, token, old_token, "module replaced");
            }
            None => {
                info!(module = %name, context = %context_name, token, path = %path.display(), "module loaded");
            }
        }
        Ok(name)
    }

    /// Remove the module registered under `name` and tear its context down.
    ///
    /// Blocks until every in-flight lookup of the entry has finished and the
    /// module's code is released, so the same name can be loaded again
    /// immediately.
    pub fn unload(&self, name: &str) -> HostResult<()> {
        if name.trim().is_empty() {
            return Err(HostError::InvalidArgument("module name is empty".to_string()));
        }

        let entry = self
            .registry
            .remove(name)
            .ok_or_else(|| HostError::not_found(NotFoundKind::Module, name))?;
        let canonical = entry.name().to_string();
        reclaim(entry);
        info!(module = %canonical, "module unloaded");
        Ok(())
    }

    /// Tear down every loaded module. Returns how many there were.
    pub fn shutdown(&self) -> usize {
        let entries = self.registry.drain();
        let count = entries.len();
        for entry in entries {
            reclaim(entry);
        }
        if count > 0 {
            info!(count, "module host shut down");
        }
        count
    }
}
