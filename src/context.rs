//! Isolation Contexts
//!
//! One context holds exactly one loaded module together with the image that
//! backs it. Tearing a context down is the only way a module's code is
//! released; every address resolved from it is invalid afterwards.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::error::HostResult;
use crate::image::{ModuleImage, ModuleOpener};
use crate::module::LoadedModule;

/// Context token counter (0 is never handed out)
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// An independently tear-down-able container for one module
pub struct IsolationContext {
    name: String,
    token: u64,
    // Field order matters: the module must be dropped before its image.
    module: LoadedModule,
    image: Box<dyn ModuleImage>,
}

impl IsolationContext {
    /// Create a context named after `path`'s file stem and load the module
    /// at `path` into it.
    pub fn open(opener: &ModuleOpener, path: &Path) -> HostResult<Self> {
        let name = context_name(path);
        let token = next_token();
        let image = opener.open(path, &name, token)?;

        // Safety: the image keeps the declaration mapped, and decoding copies
        // everything it needs out of it.
        let module = unsafe { LoadedModule::decode(image.declaration())? };

        Ok(Self {
            name,
            token,
            module,
            image,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique, monotonically increasing identity
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn module(&self) -> &LoadedModule {
        &self.module
    }

    pub fn source(&self) -> &Path {
        self.image.source()
    }

    /// Release the module and its code.
    pub fn teardown(self) {
        let Self {
            name,
            token,
            module,
            image,
        } = self;
        let module_name = module.name().to_string();
        drop(module);
        drop(image);
        info!(context = %name, token, module = %module_name, "isolation context torn down");
    }
}

impl fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationContext")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("module", &self.module.name())
            .field("source", &self.image.source())
            .finish()
    }
}

fn context_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "module".to_string())
}
