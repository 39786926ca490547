//! Native Export Surface
//!
//! `extern "C"` entry points over the process-wide [`host()`] and handle
//! [`bridge()`]. Strings are NUL-terminated UTF-8, booleans are `i32` 0/1,
//! and failures come back as 0 or null. The reason for a failure is logged
//! at `warn` and can be fetched with [`modhost_last_error`] until the calling
//! thread makes its next call; every call clears it on entry.
//!
//! No panic unwinds out of this module.

use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{HostError, HostResult};
use crate::handles::{bridge, Handle, HostObject};
use crate::host::host;
use crate::logging;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn record_failure(operation: &str, message: String) {
    warn!(operation, error = %message, "boundary call failed");
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

fn clear_failure() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Run `f`, mapping errors and panics to `failure`.
fn boundary<T>(operation: &str, failure: T, f: impl FnOnce() -> HostResult<T>) -> T {
    clear_failure();
    // First use builds the host and runs preload, so it stays inside the guard
    let guarded = || {
        logging::init_once();
        f()
    };
    match catch_unwind(AssertUnwindSafe(guarded)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            record_failure(operation, e.to_string());
            failure
        }
        Err(payload) => {
            record_failure(operation, panic_message(payload.as_ref()));
            failure
        }
    }
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> HostResult<&'a str> {
    if ptr.is_null() {
        return Err(HostError::InvalidArgument(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| HostError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

fn live_handle(handle: *mut c_void) -> HostResult<Handle> {
    Handle::from_ptr(handle)
        .filter(|h| bridge().contains(*h))
        .ok_or_else(|| HostError::InvalidArgument(format!("{:p} is not a live handle", handle)))
}

/// Load (or replace) the module at `path`. Returns 1 on success.
///
/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn modhost_load_module(path: *const c_char) -> i32 {
    boundary("load_module", 0, || {
        let path = read_str(path, "module path")?;
        host().load(path)?;
        Ok(1)
    })
}

/// Unload the module registered under the canonical `name`. Returns 1 on
/// success, 0 if no such module is loaded.
///
/// # Safety
///
/// `name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn modhost_unload_module(name: *const c_char) -> i32 {
    boundary("unload_module", 0, || {
        let name = read_str(name, "module name")?;
        host().unload(name)?;
        Ok(1)
    })
}

/// Resolve `type_name.method` in `module` to a function pointer, bound to
/// the calling signature `signature` unless it is null. Returns null on
/// failure.
///
/// # Safety
///
/// Every non-null argument must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn modhost_resolve_function(
    module: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    signature: *const c_char,
) -> *const c_void {
    boundary("resolve_function", std::ptr::null(), || {
        let module = read_str(module, "module name")?;
        let type_name = read_str(type_name, "type name")?;
        let method = read_str(method, "method name")?;
        let signature = if signature.is_null() {
            None
        } else {
            Some(read_str(signature, "signature name")?)
        };
        let resolved = host().resolve(module, type_name, method, signature)?;
        Ok(resolved.as_ptr())
    })
}

/// Allocate a fresh host object and return its handle.
#[no_mangle]
pub extern "C" fn modhost_allocate_handle() -> *mut c_void {
    boundary("allocate_handle", std::ptr::null_mut(), || {
        bridge()
            .allocate(HostObject::new())
            .map(Handle::as_ptr)
            .ok_or_else(|| HostError::InvalidArgument("handle table is full".to_string()))
    })
}

/// Release a handle. Null, stale and already-freed handles are ignored.
#[no_mangle]
pub extern "C" fn modhost_free_handle(handle: *mut c_void) {
    boundary("free_handle", (), || {
        let freed = Handle::from_ptr(handle).map(|h| bridge().free(h)).unwrap_or(false);
        if !freed {
            debug!(handle = ?handle, "ignored free of a handle that is not live");
        }
        Ok(())
    })
}

/// Store `data` in the handle's user-data cell. Returns 1 on success.
#[no_mangle]
pub extern "C" fn modhost_handle_set_data(handle: *mut c_void, data: *mut c_void) -> i32 {
    boundary("handle_set_data", 0, || {
        let handle = live_handle(handle)?;
        bridge()
            .with(handle, |object: &HostObject| object.set_data(data))
            .map(|_| 1)
            .ok_or_else(|| HostError::InvalidArgument("handle does not hold a host object".to_string()))
    })
}

/// Read the handle's user-data cell. Null if unset or the handle is not
/// live.
#[no_mangle]
pub extern "C" fn modhost_handle_get_data(handle: *mut c_void) -> *mut c_void {
    boundary("handle_get_data", std::ptr::null_mut(), || {
        let handle = live_handle(handle)?;
        bridge()
            .with(handle, |object: &HostObject| object.data())
            .ok_or_else(|| HostError::InvalidArgument("handle does not hold a host object".to_string()))
    })
}

/// Copy the calling thread's last failure message into `buf`, truncated to
/// `len - 1` bytes and NUL-terminated. Returns the number of bytes written,
/// not counting the terminator.
///
/// # Safety
///
/// `buf` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn modhost_last_error(buf: *mut c_char, len: i32) -> i32 {
    if buf.is_null() || len <= 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| {
        let slot = slot.borrow();
        let bytes = slot.as_ref().map(|m| m.as_bytes()).unwrap_or_default();
        let count = bytes.len().min(len as usize - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, count);
        *buf.add(count) = 0;
        count as i32
    })
}

/// Tear down every loaded module.
#[no_mangle]
pub extern "C" fn modhost_shutdown() {
    boundary("shutdown", (), || {
        host().shutdown();
        Ok(())
    })
}
