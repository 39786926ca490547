//! Native Images
//!
//! Shared libraries opened through libloading. With shadow copying on, the
//! file is first copied to `<shadow_dir>/<context>-<pid>-<token>.<ext>` so
//! every context maps its own file: the original can be rebuilt in place
//! while loaded, and loading the same path again yields fresh code instead of
//! the loader's cached mapping. Several host processes may share one shadow
//! directory, so an existing file there is never written over or removed.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use super::ModuleImage;
use crate::abi::{ModuleDecl, MODULE_SYMBOL};
use crate::error::{HostError, HostResult};

/// A module backed by a loaded shared library
pub struct NativeImage {
    source: PathBuf,
    /// Shadow copy to delete once the library is closed
    shadow: Option<PathBuf>,
    library: Option<Library>,
    decl: *const ModuleDecl,
}

// Safety: the declaration is immutable static data inside `library`, which
// stays open for the lifetime of the image.
unsafe impl Send for NativeImage {}
unsafe impl Sync for NativeImage {}

impl NativeImage {
    /// Open `path` directly.
    pub fn open(path: &Path) -> HostResult<Self> {
        Self::open_inner(path, path, None)
    }

    /// Copy `path` into `shadow_dir` and open the copy.
    pub fn open_shadowed(
        path: &Path,
        shadow_dir: &Path,
        context_name: &str,
        token: u64,
    ) -> HostResult<Self> {
        fs::create_dir_all(shadow_dir)
            .map_err(|e| HostError::load(path, format!("cannot create shadow directory: {}", e)))?;

        let shadow = shadow_dir.join(shadow_file_name(path, context_name, token));
        copy_exclusive(path, &shadow).map_err(|e| {
            HostError::load(
                path,
                format!("cannot create shadow copy {}: {}", shadow.display(), e),
            )
        })?;
        debug!(source = %path.display(), shadow = %shadow.display(), "created shadow copy");

        Self::open_inner(path, &shadow, Some(shadow.clone())).map_err(|e| {
            fs::remove_file(&shadow).ok();
            e
        })
    }

    fn open_inner(source: &Path, file: &Path, shadow: Option<PathBuf>) -> HostResult<Self> {
        // Safety: loading a library runs its initializers. The host trusts
        // the module paths it is given.
        let library = unsafe { Library::new(file) }.map_err(|e| HostError::load(source, e))?;

        // Safety: MODHOST_MODULE is a data symbol holding a ModuleDecl. The
        // version field is checked during decoding before anything else is
        // read.
        let decl = unsafe {
            let symbol: Symbol<*const ModuleDecl> = library.get(MODULE_SYMBOL).map_err(|e| {
                HostError::load(source, format!("missing MODHOST_MODULE symbol: {}", e))
            })?;
            *symbol
        };
        if decl.is_null() {
            return Err(HostError::load(source, "MODHOST_MODULE symbol is null"));
        }

        Ok(Self {
            source: source.to_path_buf(),
            shadow,
            library: Some(library),
            decl,
        })
    }

}

/// `<context>-<pid>-<token>[.<ext>]`; tokens only count within one process.
fn shadow_file_name(source: &Path, context_name: &str, token: u64) -> String {
    let mut name = format!("{}-{}-{}", context_name, std::process::id(), token);
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    name
}

/// Copy `source` to a new file at `dest`. Fails if `dest` already exists.
fn copy_exclusive(source: &Path, dest: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let mut output = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = io::copy(&mut input, &mut output)
        .and_then(|_| output.sync_all())
        .and_then(|_| fs::set_permissions(dest, input.metadata()?.permissions()));
    if let Err(e) = copied {
        drop(output);
        fs::remove_file(dest).ok();
        return Err(e);
    }
    Ok(())
}

impl ModuleImage for NativeImage {
    fn declaration(&self) -> &ModuleDecl {
        // Safety: checked non-null at open, and the library is still open.
        unsafe { &*self.decl }
    }

    fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for NativeImage {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                warn!(module = %self.source.display(), error = %e, "failed to close module library");
            }
        }
        if let Some(shadow) = self.shadow.take() {
            if let Err(e) = fs::remove_file(&shadow) {
                warn!(shadow = %shadow.display(), error = %e, "failed to remove shadow copy");
            }
        }
    }
}

/// Get the default library search paths for this platform
pub(super) fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
        paths.push(PathBuf::from("/usr/lib64"));

        if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
            paths.extend(ld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));

        if let Ok(dyld_path) = std::env::var("DYLD_LIBRARY_PATH") {
            paths.extend(dyld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("PATH") {
            paths.extend(path.split(';').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    paths
}

/// Construct the platform-specific library filename for a module name
pub fn library_filename(name: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        if name.starts_with("lib") && name.ends_with(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        name.to_string()
    }
}
