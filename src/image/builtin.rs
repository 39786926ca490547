//! Builtin Images
//!
//! Declarations linked into the host process. Opening one never touches the
//! filesystem and tearing one down unmaps nothing; the context boundary
//! still applies to everything derived from the decoded module.

use std::path::{Path, PathBuf};

use super::ModuleImage;
use crate::abi::ModuleDecl;

/// A statically linked module
pub struct BuiltinImage {
    source: PathBuf,
    decl: &'static ModuleDecl,
}

impl BuiltinImage {
    pub fn new(source: &Path, decl: &'static ModuleDecl) -> Self {
        Self {
            source: source.to_path_buf(),
            decl,
        }
    }
}

impl ModuleImage for BuiltinImage {
    fn declaration(&self) -> &ModuleDecl {
        self.decl
    }

    fn source(&self) -> &Path {
        &self.source
    }
}
