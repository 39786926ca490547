//! MathOps as a native module
//!
//! Exports `MODHOST_MODULE` through `declare_module!`, the way a module
//! author would ship one.

use std::ffi::c_void;

use modhost::abi::{MethodDecl, ModuleDecl, SignatureDecl, TypeCode, TypeDecl};

extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

fn add_f(a: f32, b: f32) -> f32 {
    a + b
}

modhost::extern_shim!(fn add_f_shim(a: f32, b: f32) -> f32 => add_f);

static CALCULATOR: [MethodDecl; 2] = [
    MethodDecl::boundary(
        "Add",
        add as *const c_void,
        &[TypeCode::I32, TypeCode::I32],
        TypeCode::I32,
    ),
    MethodDecl::managed(
        "AddF",
        add_f as *const c_void,
        add_f_shim as *const c_void,
        &[TypeCode::F32, TypeCode::F32],
        TypeCode::F32,
    ),
];

static TYPES: [TypeDecl; 1] = [TypeDecl::new("Calculator", &CALCULATOR)];

static SIGNATURES: [SignatureDecl; 1] = [SignatureDecl::new(
    "FloatAddDelegate",
    &[TypeCode::F32, TypeCode::F32],
    TypeCode::F32,
)];

modhost::declare_module!(ModuleDecl::new("NativeMathOps", &TYPES, &SIGNATURES));
