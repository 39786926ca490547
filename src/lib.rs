//! Modhost - Dynamic Module Host
//!
//! Loads native code modules at runtime, keeps each one in its own isolation
//! context so it can be replaced or removed while the process runs, and
//! resolves named methods inside them to raw function pointers a foreign
//! caller can invoke directly. Host-side objects cross the same boundary as
//! opaque handles.
//!
//! # Features
//!
//! - **Hot reload**: loading a module under a name that is already taken
//!   replaces it; the old context is torn down after the new one is visible
//! - **Shadow copies**: each context maps a private copy of the module file
//! - **Boundary-safe resolution**: only methods marked boundary-callable are
//!   handed out as-is; others need an exactly matching calling signature
//! - **Opaque handles**: generation-checked tokens, double free is a no-op
//! - **C export surface**: `modhost_*` symbols for non-Rust hosts
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ Foreign caller       │  modhost_load_module / modhost_resolve_function / ...
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐      ┌──────────────┐
//! │ exports              │─────►│ HandleBridge │
//! └──────────┬───────────┘      └──────────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ ModuleHost           │  load / unload / resolve
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ ModuleRegistry       │  name → IsolationContext(image, LoadedModule)
//! └──────────────────────┘
//! ```
//!
//! # Writing a module
//!
//! A module is a `cdylib` that exports its declaration with
//! [`declare_module!`]; see [`abi`] for the layout.

pub mod abi;
pub mod config;
pub mod context;
pub mod error;
pub mod exports;
pub mod handles;
pub mod host;
pub mod image;
pub mod logging;
pub mod module;
pub mod registry;

pub use abi::{MethodDecl, MethodFlags, ModuleDecl, SignatureDecl, TypeCode, TypeDecl, ABI_VERSION};
pub use config::{ConfigError, HostConfig};
pub use error::{ErrorKind, HostError, HostResult, NotFoundKind};
pub use handles::{bridge, Handle, HandleBridge, HostObject};
pub use host::{host, Binding, ModuleHost, ResolvedFunction};
pub use module::{LoadedModule, Signature, ValueKind};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(ABI_VERSION, abi::ABI_VERSION);
    }
}
