//! Module Images
//!
//! The code backing one isolation context. An image owns whatever keeps a
//! module's declaration and entry points mapped: a `libloading::Library`
//! over a private shadow copy for native modules, nothing at all for
//! builtin modules linked into the process.

mod builtin;
mod native;

pub use builtin::BuiltinImage;
pub use native::{library_filename, NativeImage};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::abi::ModuleDecl;
use crate::config::HostSettings;
use crate::error::{HostError, HostResult};

/// Mapped code and declaration of one loaded module
pub trait ModuleImage: Send + Sync {
    /// The module's exported declaration. Valid for as long as `self` lives.
    fn declaration(&self) -> &ModuleDecl;

    /// Path the image was opened from
    fn source(&self) -> &Path;
}

/// Turns a module path into a [`ModuleImage`].
pub struct ModuleOpener {
    settings: HostSettings,
    search_paths: Vec<PathBuf>,
    builtins: RwLock<HashMap<PathBuf, &'static ModuleDecl>>,
}

impl ModuleOpener {
    pub fn new(settings: &HostSettings) -> Self {
        let mut search_paths = settings.search_paths.clone();
        search_paths.extend(native::default_search_paths());
        Self {
            settings: settings.clone(),
            search_paths,
            builtins: RwLock::new(HashMap::new()),
        }
    }

    /// Make `path` open a statically linked declaration instead of a file.
    ///
    /// Returns `true` if an earlier registration for the same path was
    /// replaced.
    pub fn register_builtin(&self, path: impl AsRef<Path>, decl: &'static ModuleDecl) -> bool {
        self.builtins
            .write()
            .insert(path.as_ref().to_path_buf(), decl)
            .is_some()
    }

    /// Find a module file, by explicit path or by bare name in the search
    /// paths.
    pub fn find_module(&self, name: &Path) -> Option<PathBuf> {
        if name.exists() {
            return name.canonicalize().ok();
        }

        // Only bare names go through the search paths
        if name.components().count() != 1 {
            return None;
        }
        let file_name = library_filename(&name.to_string_lossy());
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.exists())
    }

    /// Open `path` for the context `context_name`/`token`.
    pub fn open(
        &self,
        path: &Path,
        context_name: &str,
        token: u64,
    ) -> HostResult<Box<dyn ModuleImage>> {
        if let Some(decl) = self.builtins.read().get(path).copied() {
            return Ok(Box::new(BuiltinImage::new(path, decl)));
        }

        let resolved = self
            .find_module(path)
            .ok_or_else(|| HostError::load(path, "module file not found"))?;
        let image = if self.settings.shadow_copy {
            NativeImage::open_shadowed(&resolved, &self.settings.shadow_dir, context_name, token)?
        } else {
            NativeImage::open(&resolved)?
        };
        Ok(Box::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    static EMPTY: ModuleDecl = ModuleDecl::new("Empty", &[], &[]);

    fn opener() -> ModuleOpener {
        ModuleOpener::new(&HostSettings::default())
    }

    #[test]
    fn test_builtin_open() {
        let opener = opener();
        assert!(!opener.register_builtin("builtin/empty", &EMPTY));
        assert!(opener.register_builtin("builtin/empty", &EMPTY));

        let image = opener.open(Path::new("builtin/empty"), "empty", 1).unwrap();
        assert_eq!(image.source(), Path::new("builtin/empty"));
        assert_eq!(unsafe { image.declaration().name.to_str() }.unwrap(), "Empty");
    }

    #[test]
    fn test_missing_file() {
        let err = match opener().open(Path::new("/no/such/dir/libnothing.so"), "libnothing", 2) {
            Ok(_) => panic!("opened a missing file"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(err, HostError::Load { .. }));
    }

    #[test]
    fn test_search_paths() {
        let dir = std::env::temp_dir().join(format!("modhost-search-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join(library_filename("findme"));
        std::fs::write(&file, b"not a library").unwrap();

        let settings = HostSettings {
            search_paths: vec![dir.clone()],
            ..HostSettings::default()
        };
        let opener = ModuleOpener::new(&settings);
        assert_eq!(opener.find_module(Path::new("findme")), Some(file));
        assert_eq!(opener.find_module(Path::new("nested/findme")), None);

        std::fs::remove_dir_all(&dir).ok();
    }
}
