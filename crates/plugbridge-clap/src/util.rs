//! Helpers shared by the `extern "C"` callbacks.

use std::any::Any;
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Return `$ret` early when any of the pointers is null. Pointers are checked
/// left to right, so later ones may dereference earlier ones.
macro_rules! check_null_ptr {
    ($ret:expr, $ptr:expr $(, $ptrs:expr)* $(,)?) => {
        if $ptr.is_null() $(|| $ptrs.is_null())* {
            ::tracing::debug!("Null pointer passed to {}", ::std::stringify!($ptr));
            return $ret;
        }
    };
}
pub(crate) use check_null_ptr;

/// Run an ABI callback body, turning a panic into `fallback` so it never
/// unwinds into the host.
pub(crate) fn boundary<T>(callback: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            error!(callback, "Panic at the ABI boundary: {}", panic_message(&*payload));
            fallback
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Copy a nullable C string. Invalid UTF-8 is replaced rather than rejected.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn string_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Write `value` into a fixed-size C string field, truncating on a character
/// boundary and always leaving a terminating NUL.
pub(crate) fn write_c_string(dest: &mut [c_char], value: &str) {
    let Some(max) = dest.len().checked_sub(1) else {
        return;
    };
    let value = plugbridge_core::controls::truncate_name(value, max);
    for (slot, byte) in dest.iter_mut().zip(value.bytes()) {
        *slot = byte as c_char;
    }
    dest[value.len()..].fill(0);
}
