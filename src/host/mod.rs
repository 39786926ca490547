//! Module Host
//!
//! Loads modules into isolation contexts, keeps them in the registry under
//! their canonical names, and resolves their methods to raw entry points.
//!
//! # Architecture
//!
//! ```text
//! load(path)                       resolve(module, type, method, sig?)
//!     │                                 │
//!     ▼                                 ▼
//! ModuleOpener ── image ──┐        ModuleRegistry::get
//!                         ▼             │
//!               IsolationContext        ▼
//!                         │        type ─► method ─► boundary? / trampoline
//!                         ▼             │
//!               ModuleRegistry          ▼
//!          insert_or_replace ─► reclaim(old)   ResolvedFunction
//! ```
//!
//! # Example
//!
//! ```ignore
//! let host = ModuleHost::new(HostConfig::default());
//! let name = host.load("modules/libmathops.so")?;
//!
//! let add = host.resolve(&name, "Calculator", "Add", None)?;
//! let add: extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(add.as_ptr()) };
//! assert_eq!(add(2, 3), 5);
//! ```

mod loader;
mod resolver;

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tracing::warn;

use crate::abi::ModuleDecl;
use crate::config::HostConfig;
use crate::image::ModuleOpener;
use crate::module::CodeAddress;
use crate::registry::ModuleRegistry;

/// How a resolved address relates to the method it was resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The method's own boundary-callable entry point
    Direct,
    /// A generated `extern "C"` shim bound to the named calling signature
    Trampoline { signature: String },
}

/// A raw entry point handed to a caller
///
/// Valid only while the context it came from is registered. Nothing
/// enforces that; [`ModuleHost::is_live`] lets a careful caller check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFunction {
    address: CodeAddress,
    module: String,
    context_token: u64,
    binding: Binding,
}

impl ResolvedFunction {
    pub fn as_ptr(&self) -> *const c_void {
        self.address.as_ptr()
    }

    /// Canonical name of the owning module
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Token of the owning isolation context
    pub fn context_token(&self) -> u64 {
        self.context_token
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }
}

/// Registry-backed module host
pub struct ModuleHost {
    config: HostConfig,
    opener: ModuleOpener,
    registry: ModuleRegistry,
}

impl ModuleHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            opener: ModuleOpener::new(&config.host),
            registry: ModuleRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Serve loads of `path` from a statically linked declaration.
    pub fn register_builtin(&self, path: impl AsRef<Path>, decl: &'static ModuleDecl) -> bool {
        self.opener.register_builtin(path, decl)
    }

    /// Load every path, logging failures instead of stopping at them.
    /// Returns the number of modules loaded.
    pub fn preload(&self, paths: &[PathBuf]) -> usize {
        paths
            .iter()
            .filter(|path| match self.load(path) {
                Ok(_) => true,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "preload failed");
                    false
                }
            })
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Number of loaded modules
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Whether `function`'s context is still the registered one for its
    /// module
    pub fn is_live(&self, function: &ResolvedFunction) -> bool {
        self.registry
            .get(&function.module)
            .map(|entry| entry.context().token() == function.context_token)
            .unwrap_or(false)
    }
}

static HOST: Lazy<ModuleHost> = Lazy::new(|| {
    let config = HostConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load configuration, using defaults");
        HostConfig::default()
    });
    let host = ModuleHost::new(config);
    let preload = host.config.preload.modules.clone();
    host.preload(&preload);
    host
});

/// The process-wide host the export surface operates on
pub fn host() -> &'static ModuleHost {
    &HOST
}
