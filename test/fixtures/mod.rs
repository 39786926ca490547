//! Shared test modules
//!
//! Builtin module declarations registered with a host under fake paths, so
//! the full load/resolve/unload cycle runs without building a cdylib. The
//! native tests use `test/fixtures/mathops`, a real cdylib built on demand.

#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use modhost::abi::{MethodDecl, MethodFlags, ModuleDecl, SignatureDecl, TypeCode, TypeDecl};

pub const MATH_OPS_PATH: &str = "fixtures/MathOps.so";

extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

extern "C" fn negate(a: i64) -> i64 {
    -a
}

fn add_f(a: f32, b: f32) -> f32 {
    a + b
}

fn secret() -> i32 {
    42
}

modhost::extern_shim!(fn add_f_shim(a: f32, b: f32) -> f32 => add_f);
modhost::extern_shim!(fn secret_shim() -> i32 => secret);

static CALCULATOR: [MethodDecl; 4] = [
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
    MethodDecl::boundary("Negate", negate as *const c_void, &[TypeCode::I64], TypeCode::I64),
    // Static but not public
    MethodDecl::managed(
        "Secret",
        secret as *const c_void,
        secret_shim as *const c_void,
        &[],
        TypeCode::I32,
    )
    .with_flags(MethodFlags::STATIC),
];

static TYPES: [TypeDecl; 1] = [TypeDecl::new("Calculator", &CALCULATOR)];

static SIGNATURES: [SignatureDecl; 2] = [
    SignatureDecl::new("FloatAddDelegate", &[TypeCode::F32, TypeCode::F32], TypeCode::F32),
    SignatureDecl::new("DoubleAddDelegate", &[TypeCode::F64, TypeCode::F64], TypeCode::F64),
];

pub static MATH_OPS: ModuleDecl = ModuleDecl::new("MathOps", &TYPES, &SIGNATURES);

pub type AddFn = extern "C" fn(i32, i32) -> i32;
pub type AddFFn = extern "C" fn(f32, f32) -> f32;

/// A module with the MathOps tables under another canonical name.
pub fn leaked_module(name: &str) -> &'static ModuleDecl {
    let name: &'static str = Box::leak(name.to_string().into_boxed_str());
    Box::leak(Box::new(ModuleDecl::new(name, &TYPES, &SIGNATURES)))
}

/// Scratch directory unique to this process and `label`.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("modhost-{}-{}", label, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// First libc found on this system, for opening a real library that
/// declares no module.
pub fn system_libc() -> Option<PathBuf> {
    [
        "/lib/x86_64-linux-gnu/libc.so.6",
        "/usr/lib/x86_64-linux-gnu/libc.so.6",
        "/lib/aarch64-linux-gnu/libc.so.6",
        "/usr/lib/aarch64-linux-gnu/libc.so.6",
        "/lib64/libc.so.6",
        "/usr/lib64/libc.so.6",
        "/usr/lib/libc.so.6",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// Build the `modhost-mathops` cdylib (once per test binary) and return the
/// path of the shared library.
pub fn native_math_ops() -> PathBuf {
    static BUILT: OnceLock<PathBuf> = OnceLock::new();
    BUILT
        .get_or_init(|| {
            let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("test/fixtures/mathops/Cargo.toml");
            // Separate target dir: the outer cargo still holds the lock on its own
            let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("mathops-fixture");

            let output = Command::new(env!("CARGO"))
                .args(["build", "--quiet", "--manifest-path"])
                .arg(&manifest)
                .arg("--target-dir")
                .arg(&target_dir)
                .output()
                .expect("failed to run cargo");
            assert!(
                output.status.success(),
                "building the mathops fixture failed:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );

            let library = target_dir
                .join("debug")
                .join(format!("{}modhost_mathops{}", DLL_PREFIX, DLL_SUFFIX));
            assert!(library.exists(), "missing {}", library.display());
            library
        })
        .clone()
}

/// Files currently in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}
