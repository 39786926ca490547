//! Function Pointer Resolution

use tracing::debug;

use super::{Binding, ModuleHost, ResolvedFunction};
use crate::error::{HostError, HostResult, NotFoundKind};
use crate::module::{CodeAddress, MethodInfo, Signature};

impl ModuleHost {
    /// Resolve `type_name.method` in `module` to a callable address.
    ///
    /// Without a signature the method must be boundary-callable and its own
    /// entry point is returned. With one, the named signature must exist in
    /// the module and match the method's shape exactly; a method that is not
    /// boundary-callable is then reached through its generated shim.
    pub fn resolve(
        &self,
        module: &str,
        type_name: &str,
        method: &str,
        signature: Option<&str>,
    ) -> HostResult<ResolvedFunction> {
        require("module name", module)?;
        require("type name", type_name)?;
        require("method name", method)?;
        if let Some(signature) = signature {
            require("signature name", signature)?;
        }

        let entry = self
            .registry
            .get(module)
            .ok_or_else(|| HostError::not_found(NotFoundKind::Module, module))?;
        let loaded = entry.module();

        let ty = loaded
            .find_type(type_name)
            .ok_or_else(|| HostError::not_found(NotFoundKind::Type, type_name))?;
        let info = ty.find_method(method).ok_or_else(|| {
            HostError::not_found(NotFoundKind::Method, format!("{}.{}", type_name, method))
        })?;

        let (address, binding) = match signature {
            None => (direct_entry(type_name, info)?, Binding::Direct),
            Some(signature) => {
                let signature = loaded
                    .find_signature(signature)
                    .ok_or_else(|| HostError::not_found(NotFoundKind::Signature, signature))?;
                bind(type_name, info, signature)?
            }
        };

        debug!(
            module = %entry.name(),
            method = %format_args!("{}.{}", type_name, method),
            binding = ?binding,
            address = ?address.as_ptr(),
            "resolved function"
        );

        Ok(ResolvedFunction {
            address,
            module: entry.name().to_string(),
            context_token: entry.context().token(),
            binding,
        })
    }
}

fn require(what: &str, value: &str) -> HostResult<()> {
    if value.trim().is_empty() {
        return Err(HostError::InvalidArgument(format!("{} is empty", what)));
    }
    Ok(())
}

fn not_callable(type_name: &str, info: &MethodInfo) -> HostError {
    HostError::NotCallable {
        type_name: type_name.to_string(),
        method: info.name().to_string(),
    }
}

fn direct_entry(type_name: &str, info: &MethodInfo) -> HostResult<CodeAddress> {
    if !info.is_boundary_callable() {
        return Err(not_callable(type_name, info));
    }
    info.address.ok_or_else(|| not_callable(type_name, info))
}

/// Bind `info` to `signature`, exact shape match only.
fn bind(
    type_name: &str,
    info: &MethodInfo,
    signature: &Signature,
) -> HostResult<(CodeAddress, Binding)> {
    if !signature.matches_shape(&info.signature) {
        return Err(HostError::SignatureMismatch {
            method: format!("{}.{}", type_name, info.name()),
            expected: format!("{} {}", signature.name, signature.shape()),
            actual: info.signature.shape(),
        });
    }

    // Already speaks the C ABI with this exact shape
    if info.is_boundary_callable() {
        return Ok((direct_entry(type_name, info)?, Binding::Direct));
    }

    let shim = info.shim.ok_or_else(|| not_callable(type_name, info))?;
    Ok((
        shim,
        Binding::Trampoline {
            signature: signature.name.clone(),
        },
    ))
}
