//! Host Errors
//!
//! Every failure the host can report. All of them are expected outcomes:
//! the export surface turns them into a sentinel value plus a diagnostic,
//! never into an unwind across the boundary.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Module,
    Type,
    Method,
    Signature,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Module => write!(f, "Module"),
            NotFoundKind::Type => write!(f, "Type"),
            NotFoundKind::Method => write!(f, "Method"),
            NotFoundKind::Signature => write!(f, "Signature type"),
        }
    }
}

/// Coarse classification of a [`HostError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    NotCallable,
    SignatureMismatch,
    /// The module file could not be read, opened or decoded.
    Transport,
}

/// Error type for module host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    #[error("Method '{type_name}.{method}' is not boundary-callable and no calling signature was given")]
    NotCallable { type_name: String, method: String },

    #[error("Signature mismatch for '{method}': signature is {expected}, method is {actual}")]
    SignatureMismatch {
        method: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to load module '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("Module ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch { expected: u32, found: u32 },

    #[error("Invalid module '{module}': {reason}")]
    InvalidModule { module: String, reason: String },
}

impl HostError {
    pub fn not_found(kind: NotFoundKind, name: impl Into<String>) -> Self {
        HostError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn load(path: &Path, reason: impl fmt::Display) -> Self {
        HostError::Load {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_module(module: impl Into<String>, reason: impl fmt::Display) -> Self {
        HostError::InvalidModule {
            module: module.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HostError::NotFound { .. } => ErrorKind::NotFound,
            HostError::NotCallable { .. } => ErrorKind::NotCallable,
            HostError::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            HostError::Load { .. } | HostError::AbiMismatch { .. } | HostError::InvalidModule { .. } => {
                ErrorKind::Transport
            }
        }
    }
}

/// Result type for module host operations.
pub type HostResult<T> = Result<T, HostError>;
