//! Integration Tests for the C Export Surface
//!
//! Calls the `modhost_*` symbols the way a foreign host would: raw C
//! strings in, 0/1 and raw pointers out, diagnostics through
//! `modhost_last_error`. All tests share the process-wide host, so each
//! one works on its own module names.

mod fixtures;

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;
use std::thread;

use fixtures::{AddFFn, AddFn, MATH_OPS, MATH_OPS_PATH};
use modhost::exports::*;
use modhost::host;

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn last_error() -> String {
    let mut buf = [0 as c_char; 512];
    unsafe { modhost_last_error(buf.as_mut_ptr(), buf.len() as i32) };
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn resolve(module: &str, ty: &str, method: &str, signature: Option<&str>) -> *const c_void {
    let module = c(module);
    let ty = c(ty);
    let method = c(method);
    let signature = signature.map(c);
    unsafe {
        modhost_resolve_function(
            module.as_ptr(),
            ty.as_ptr(),
            method.as_ptr(),
            signature.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
        )
    }
}

// =============================================================================
// MathOps Scenario
// =============================================================================

#[test]
fn test_math_ops_scenario() {
    host().register_builtin(MATH_OPS_PATH, &MATH_OPS);
    assert_eq!(unsafe { modhost_load_module(c(MATH_OPS_PATH).as_ptr()) }, 1);

    let add = resolve("MathOps", "Calculator", "Add", None);
    assert!(!add.is_null());
    let add: AddFn = unsafe { std::mem::transmute(add) };
    assert_eq!(add(2, 3), 5);

    assert!(resolve("MathOps", "Calculator", "AddF", None).is_null());
    assert!(last_error().contains("not boundary-callable"));

    let add_f = resolve("MathOps", "Calculator", "AddF", Some("FloatAddDelegate"));
    assert!(!add_f.is_null());
    let add_f: AddFFn = unsafe { std::mem::transmute(add_f) };
    assert_eq!(add_f(0.5, 0.25), 0.75);

    assert!(resolve("MathOps", "Calculator", "AddF", Some("DoubleAddDelegate")).is_null());
    assert!(last_error().contains("Signature mismatch"));

    assert!(resolve("MathOps", "Calculator", "AddF", Some("NoSuchDelegate")).is_null());
    assert!(last_error().contains("Signature type not found"));

    assert_eq!(unsafe { modhost_unload_module(c("MathOps").as_ptr()) }, 1);
    assert!(resolve("MathOps", "Calculator", "Add", None).is_null());
    assert!(last_error().contains("Module not found"));
    assert_eq!(unsafe { modhost_unload_module(c("MathOps").as_ptr()) }, 0);
}

#[test]
fn test_reload_through_exports() {
    host().register_builtin("fixtures/Reloaded.so", fixtures::leaked_module("Reloaded"));
    let path = c("fixtures/Reloaded.so");

    assert_eq!(unsafe { modhost_load_module(path.as_ptr()) }, 1);
    assert_eq!(unsafe { modhost_load_module(path.as_ptr()) }, 1);
    assert_eq!(
        host().module_names().iter().filter(|n| *n == "Reloaded").count(),
        1
    );
    assert_eq!(unsafe { modhost_unload_module(c("Reloaded").as_ptr()) }, 1);
}

// =============================================================================
// Failure Reporting
// =============================================================================

#[test]
fn test_invalid_inputs() {
    assert_eq!(unsafe { modhost_load_module(ptr::null()) }, 0);
    assert!(last_error().contains("null"));

    assert_eq!(unsafe { modhost_load_module(c("").as_ptr()) }, 0);
    assert!(last_error().contains("empty"));

    assert_eq!(unsafe { modhost_load_module(c("/no/such/dir/libghost.so").as_ptr()) }, 0);
    assert!(last_error().contains("libghost"));

    assert_eq!(unsafe { modhost_unload_module(c("NeverLoadedModule").as_ptr()) }, 0);
    assert!(last_error().contains("NeverLoadedModule"));

    let invalid = [0xffu8, 0xfe, 0];
    assert_eq!(
        unsafe { modhost_unload_module(invalid.as_ptr() as *const c_char) },
        0
    );
    assert!(last_error().contains("UTF-8"));
}

#[test]
fn test_unknown_module_resolves_to_null() {
    assert!(resolve("nonexistent-module", "Calculator", "Add", None).is_null());
    assert!(last_error().contains("Module not found: nonexistent-module"));
    assert!(!host().contains("nonexistent-module"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_loads_through_exports() {
    const THREADS: usize = 8;
    for i in 0..THREADS {
        host().register_builtin(
            format!("fixtures/ExportWorker{}.so", i),
            fixtures::leaked_module(&format!("ExportWorker{}", i)),
        );
    }

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            thread::spawn(move || {
                let path = c(&format!("fixtures/ExportWorker{}.so", i));
                unsafe { modhost_load_module(path.as_ptr()) }
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), 1);
    }

    for i in 0..THREADS {
        let name = format!("ExportWorker{}", i);
        assert!(host().contains(&name));
        assert!(!resolve(&name, "Calculator", "Add", None).is_null());
    }
}

// =============================================================================
// Handles
// =============================================================================

#[test]
fn test_handle_double_free() {
    let handle = modhost_allocate_handle();
    assert!(!handle.is_null());

    modhost_free_handle(handle);
    modhost_free_handle(handle);
    modhost_free_handle(ptr::null_mut());
    // Generation bits without a slot index
    modhost_free_handle((1usize << (usize::BITS / 2)) as *mut c_void);
}

#[test]
fn test_handle_user_data() {
    let a = modhost_allocate_handle();
    let b = modhost_allocate_handle();
    assert_ne!(a, b);

    let payload = Box::into_raw(Box::new(99u64)) as *mut c_void;
    assert_eq!(modhost_handle_set_data(a, payload), 1);
    assert_eq!(modhost_handle_get_data(a), payload);
    assert!(modhost_handle_get_data(b).is_null());

    modhost_free_handle(a);
    assert!(modhost_handle_get_data(a).is_null());
    assert_eq!(modhost_handle_set_data(a, payload), 0);

    // The bridge never owned the payload
    drop(unsafe { Box::from_raw(payload as *mut u64) });
    modhost_free_handle(b);
}
