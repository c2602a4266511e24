//! FFI bindings for the burnout engine
//!
//! C-compatible functions over the JSON API. All functions take null-terminated
//! C strings and return allocated memory that must be freed by the caller with
//! `burnout_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::EngineError;
use crate::pipeline::{analyze_team_json, correlate_json, AnalyzerConfig, BurnoutProcessor};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Convert a C string to an owned Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Map a JSON result onto the C convention: string on success, NULL plus
/// last error on failure.
fn json_result_to_cstr(result: Result<String, EngineError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a JSON array of entity inputs and return the JSON report.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `burnout_free_string`.
/// - Returns NULL on error; call `burnout_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn burnout_analyze_json(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    json_result_to_cstr(analyze_team_json(&json_str))
}

/// Correlate incident, commit and message streams given as one JSON object.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `burnout_free_string`.
/// - Returns NULL on error; call `burnout_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn burnout_correlate_json(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    json_result_to_cstr(correlate_json(&json_str))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a BurnoutProcessor
pub struct BurnoutProcessorHandle {
    processor: BurnoutProcessor,
}

/// Create a new processor keeping `history_window` runs per metric.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `burnout_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn burnout_processor_new(history_window: i32) -> *mut BurnoutProcessorHandle {
    clear_last_error();

    let mut config = AnalyzerConfig::default();
    if history_window > 0 {
        config.history_window = history_window as usize;
    }

    let handle = Box::new(BurnoutProcessorHandle {
        processor: BurnoutProcessor::with_config(config),
    });
    Box::into_raw(handle)
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `burnout_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn burnout_processor_free(processor: *mut BurnoutProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Analyze entity inputs against the processor's history and record the run.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `burnout_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `burnout_free_string`.
/// - Returns NULL on error; call `burnout_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn burnout_processor_process_json(
    processor: *mut BurnoutProcessorHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    json_result_to_cstr(handle.processor.process_json(&json_str))
}

/// Save processor history to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `burnout_processor_new`.
/// - Returns a newly allocated string that must be freed with `burnout_free_string`.
/// - Returns NULL on error; call `burnout_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn burnout_processor_save_history(
    processor: *mut BurnoutProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    json_result_to_cstr(handle.processor.save_history())
}

/// Load processor history from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `burnout_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
/// - On error, call `burnout_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn burnout_processor_load_history(
    processor: *mut BurnoutProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_history(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a burnout function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a burnout function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn burnout_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next burnout function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn burnout_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn burnout_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_inputs_json() -> CString {
        CString::new(
            r#"[{
                "entity_id": "alice",
                "timezone": "America/New_York",
                "as_of": "2024-01-31",
                "incidents": [
                    {"id": "i1", "kind": "incident", "entity_id": "alice",
                     "timestamp": "2024-01-10T04:30:00Z", "severity": "sev1"},
                    {"id": "i2", "kind": "incident", "entity_id": "alice",
                     "timestamp": "2024-01-13T15:00:00Z", "severity": "sev2"}
                ],
                "commits": [
                    {"id": "c1", "kind": "commit", "entity_id": "alice",
                     "timestamp": "2024-01-10T05:00:00Z"}
                ]
            }]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_analyze_json() {
        let json = sample_inputs_json();

        unsafe {
            let result = burnout_analyze_json(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("report_version"));
            assert!(result_str.contains("alice"));

            burnout_free_string(result);
        }
    }

    #[test]
    fn test_ffi_correlate_json() {
        let json = CString::new(r#"{"timezone": "UTC", "incidents": [], "commits": [], "messages": []}"#)
            .unwrap();

        unsafe {
            let result = burnout_correlate_json(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("insufficient_data"));

            burnout_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = burnout_processor_new(5);
            assert!(!processor.is_null());

            let json = sample_inputs_json();
            let result = burnout_processor_process_json(processor, json.as_ptr());
            assert!(!result.is_null());
            burnout_free_string(result);

            let history = burnout_processor_save_history(processor);
            assert!(!history.is_null());

            let processor2 = burnout_processor_new(5);
            let load_result = burnout_processor_load_history(processor2, history);
            assert_eq!(load_result, 0);

            burnout_free_string(history);
            burnout_processor_free(processor);
            burnout_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = burnout_analyze_json(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = burnout_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            assert!(burnout_analyze_json(ptr::null()).is_null());
            assert_eq!(burnout_processor_load_history(ptr::null_mut(), ptr::null()), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = burnout_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
