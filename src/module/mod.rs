//! Loaded Modules
//!
//! A [`LoadedModule`] is the decoded, validated, owned form of a module's
//! [`ModuleDecl`]: names are copied out, type codes are checked, and
//! duplicates are rejected once, at load time. Lookups afterwards are plain
//! hash map reads and never touch the foreign declaration again.
//!
//! Method addresses stay raw. They point into the module's code and are only
//! meaningful while the owning [`crate::context::IsolationContext`] is alive.

mod types;

pub use types::{Signature, ValueKind};

use std::collections::HashMap;
use std::ffi::c_void;

use crate::abi::{MethodDecl, MethodFlags, ModuleDecl, SignatureDecl, StrRef, TypeCode, ABI_VERSION};
use crate::error::{HostError, HostResult};

/// A method entry point.
///
/// Stored as an integer so that decoded modules are `Send + Sync`; the
/// address is never dereferenced by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeAddress(usize);

impl CodeAddress {
    fn from_ptr(ptr: *const c_void) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self(ptr as usize))
        }
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// A decoded method
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub flags: MethodFlags,
    /// Name plus parameter/return shape
    pub signature: Signature,
    /// Native entry point
    pub address: Option<CodeAddress>,
    /// Build-time generated `extern "C"` shim, for non-boundary methods
    pub shim: Option<CodeAddress>,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn is_public_static(&self) -> bool {
        self.flags
            .contains(MethodFlags::PUBLIC.union(MethodFlags::STATIC))
    }

    pub fn is_boundary_callable(&self) -> bool {
        self.flags.contains(MethodFlags::BOUNDARY)
    }
}

/// A decoded type with its methods
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    methods: Vec<MethodInfo>,
}

impl TypeInfo {
    /// Find a public static method by name
    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.is_public_static() && m.name() == name)
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }
}

/// In-memory representation of a loaded module
#[derive(Debug, Clone)]
pub struct LoadedModule {
    name: String,
    types: HashMap<String, TypeInfo>,
    signatures: HashMap<String, Signature>,
}

impl LoadedModule {
    /// Decode and validate a module declaration.
    ///
    /// # Safety
    ///
    /// Every pointer reachable from `decl` must be valid for reads for the
    /// duration of the call. The returned value owns copies of all names,
    /// so it does not borrow from `decl`.
    pub unsafe fn decode(decl: &ModuleDecl) -> HostResult<Self> {
        if decl.abi_version != ABI_VERSION {
            return Err(HostError::AbiMismatch {
                expected: ABI_VERSION,
                found: decl.abi_version,
            });
        }

        let name = decode_name(&decl.name, "<unnamed>", "module name")?;

        let mut types = HashMap::new();
        for ty in decl.types.as_slice() {
            let type_name = decode_name(&ty.name, &name, "type name")?;

            let mut methods: Vec<MethodInfo> = Vec::new();
            for method in ty.methods.as_slice() {
                let info = decode_method(method, &name, &type_name)?;
                if info.is_public_static()
                    && methods
                        .iter()
                        .any(|m| m.is_public_static() && m.name() == info.name())
                {
                    return Err(HostError::invalid_module(
                        &name,
                        format!("overloaded method '{}.{}'", type_name, info.name()),
                    ));
                }
                methods.push(info);
            }

            let info = TypeInfo {
                name: type_name.clone(),
                methods,
            };
            if types.insert(type_name.clone(), info).is_some() {
                return Err(HostError::invalid_module(
                    &name,
                    format!("duplicate type '{}'", type_name),
                ));
            }
        }

        let mut signatures = HashMap::new();
        for sig in decl.signatures.as_slice() {
            let signature = decode_signature(sig, &name)?;
            let sig_name = signature.name.clone();
            if signatures.insert(sig_name.clone(), signature).is_some() {
                return Err(HostError::invalid_module(
                    &name,
                    format!("duplicate signature '{}'", sig_name),
                ));
            }
        }

        Ok(Self {
            name,
            types,
            signatures,
        })
    }

    /// Canonical module name (the registry key)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find a type by its full name
    pub fn find_type(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Find a named calling signature
    pub fn find_signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }
}

unsafe fn decode_name(raw: &StrRef, module: &str, what: &str) -> HostResult<String> {
    let s = raw
        .to_str()
        .map_err(|e| HostError::invalid_module(module, format!("{} is not UTF-8: {}", what, e)))?;
    if s.trim().is_empty() {
        return Err(HostError::invalid_module(module, format!("empty {}", what)));
    }
    Ok(s.to_string())
}

fn decode_kinds(
    codes: &[TypeCode],
    module: &str,
    owner: &str,
) -> HostResult<Vec<ValueKind>> {
    codes
        .iter()
        .map(|&code| decode_kind(code, module, owner))
        .collect()
}

fn decode_kind(code: TypeCode, module: &str, owner: &str) -> HostResult<ValueKind> {
    ValueKind::from_code(code).ok_or_else(|| {
        HostError::invalid_module(module, format!("unknown type code {} in '{}'", code.0, owner))
    })
}

unsafe fn decode_method(
    method: &MethodDecl,
    module: &str,
    type_name: &str,
) -> HostResult<MethodInfo> {
    let name = decode_name(&method.name, module, "method name")?;
    let owner = format!("{}.{}", type_name, name);
    let params = decode_kinds(method.params.as_slice(), module, &owner)?;
    let ret = decode_kind(method.ret, module, &owner)?;

    let address = CodeAddress::from_ptr(method.address);
    if method.flags.contains(MethodFlags::BOUNDARY) && address.is_none() {
        return Err(HostError::invalid_module(
            module,
            format!("boundary-callable method '{}' has no entry point", owner),
        ));
    }

    Ok(MethodInfo {
        flags: method.flags,
        signature: Signature::new(name, params, ret),
        address,
        shim: CodeAddress::from_ptr(method.shim),
    })
}

unsafe fn decode_signature(sig: &SignatureDecl, module: &str) -> HostResult<Signature> {
    let name = decode_name(&sig.name, module, "signature name")?;
    let params = decode_kinds(sig.params.as_slice(), module, &name)?;
    let ret = decode_kind(sig.ret, module, &name)?;
    Ok(Signature::new(name, params, ret))
}
