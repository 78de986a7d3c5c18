//! Marshaling between host values and the native wire conventions
//!
//! Two conventions are used at the boundary:
//!
//! - **Structured payloads** go *into* native code as borrowed,
//!   null-terminated JSON (or plain) strings. Optional fields are omitted
//!   rather than sent as `null`, so native defaults apply. The pointer is only
//!   valid for the duration of the call.
//! - **Returned strings** come *out of* native code as a pointer plus an
//!   explicit length written to an out-parameter. The host copies exactly
//!   `length` bytes and hands the pointer back to the native free function.
//!   [`use_native_bytes`] is the only place that pairs produce, copy and free.
//!
//! Callback results flow the other way: the host allocates with
//! [`into_host_buffer`] and the native side returns ownership through
//! [`host_free_buffer`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::{c_char, CString};
use std::ptr;
use thiserror::Error;

/// Native free entry point: `void free_buffer(char *ptr)`
pub type FreeBufferFn = unsafe extern "C" fn(ptr: *mut c_char);

/// Host free entry point handed to native code at adapter creation.
pub type HostFreeFn = unsafe extern "C" fn(ptr: *mut u8, len: u64);

/// Marshal error types
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Serializing a host value failed
    #[error("Failed to encode {context} as JSON: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Deserializing a native payload failed
    #[error("Failed to decode {context} from JSON: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A string destined for a null-terminated parameter contains NUL
    #[error("{context} contains a NUL byte at offset {position}")]
    InteriorNul {
        context: &'static str,
        position: usize,
    },

    /// Bytes that must be text are not UTF-8
    #[error("{context} is not valid UTF-8")]
    InvalidUtf8 { context: &'static str },

    /// The native call returned a null pointer
    #[error("Native call produced no value")]
    NullResult,

    /// A null pointer was paired with a non-zero length
    #[error("Null buffer with non-zero length {len}")]
    NullBuffer { len: u64 },
}

/// Encode a host value as a null-terminated JSON string.
pub fn encode_json<T: Serialize + ?Sized>(
    value: &T,
    context: &'static str,
) -> Result<CString, MarshalError> {
    let json =
        serde_json::to_vec(value).map_err(|source| MarshalError::Encode { context, source })?;
    bytes_to_cstring(json, context)
}

/// Decode a JSON payload received from native code.
pub fn decode_json<T: DeserializeOwned>(
    bytes: &[u8],
    context: &'static str,
) -> Result<T, MarshalError> {
    serde_json::from_slice(bytes).map_err(|source| MarshalError::Decode { context, source })
}

/// Convert a plain string parameter (names, keys, ids).
pub fn to_cstring(value: &str, context: &'static str) -> Result<CString, MarshalError> {
    bytes_to_cstring(value.as_bytes().to_vec(), context)
}

/// Convert an optional string parameter; `None` is passed as a null pointer.
pub fn to_opt_cstring(
    value: Option<&str>,
    context: &'static str,
) -> Result<Option<CString>, MarshalError> {
    value.map(|v| to_cstring(v, context)).transpose()
}

/// Encode an optional payload; `None` is passed as a null pointer.
pub fn encode_opt_json<T: Serialize>(
    value: Option<&T>,
    context: &'static str,
) -> Result<Option<CString>, MarshalError> {
    value.map(|v| encode_json(v, context)).transpose()
}

/// Pointer for an optional C string, null when absent.
pub fn opt_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

fn bytes_to_cstring(bytes: Vec<u8>, context: &'static str) -> Result<CString, MarshalError> {
    CString::new(bytes).map_err(|e| MarshalError::InteriorNul {
        context,
        position: e.nul_position(),
    })
}

/// A buffer owned by native code, returned on drop.
struct NativeBuffer {
    ptr: *mut c_char,
    len: usize,
    free: FreeBufferFn,
}

impl NativeBuffer {
    fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: the producer contract of `use_native_bytes` guarantees
        // `ptr` is valid for `len` bytes until freed.
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.len) }
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by the paired native allocator and is
        // freed exactly once, here.
        unsafe { (self.free)(self.ptr) };
    }
}

/// Run a native producer and copy its returned buffer into host memory.
///
/// The producer receives the length out-parameter and returns the buffer
/// pointer. A null pointer yields `None` (no value). Otherwise exactly
/// `length` bytes are copied, embedded NUL bytes included, and the pointer is
/// handed to `free` exactly once, even if copying panics.
///
/// # Safety
///
/// A non-null pointer returned by `producer` must be valid for reads of the
/// reported length and must be releasable with `free`.
pub unsafe fn use_native_bytes<F>(free: FreeBufferFn, producer: F) -> Option<Vec<u8>>
where
    F: FnOnce(*mut u64) -> *mut c_char,
{
    let mut len: u64 = 0;
    let ptr = producer(&mut len);
    if ptr.is_null() {
        return None;
    }

    let buffer = NativeBuffer {
        ptr,
        len: len as usize,
        free,
    };
    Some(buffer.as_bytes().to_vec())
}

/// Like [`use_native_bytes`], requiring a UTF-8 result.
///
/// # Safety
///
/// Same contract as [`use_native_bytes`].
pub unsafe fn use_native_string<F>(free: FreeBufferFn, producer: F) -> Result<String, MarshalError>
where
    F: FnOnce(*mut u64) -> *mut c_char,
{
    let bytes = use_native_bytes(free, producer).ok_or(MarshalError::NullResult)?;
    String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8 {
        context: "native result",
    })
}

/// Hand a host-allocated buffer to native code.
///
/// Writes the length to `out_len` (when non-null) and returns the pointer.
/// Ownership passes to the native side, which must give it back through
/// [`host_free_buffer`] with the same length.
///
/// # Safety
///
/// A non-null `out_len` must be valid for a `u64` write.
///
/// ```compile_fail
/// use flagbridge_runtime::ffi::marshal::into_host_buffer;
///
/// let mut len = 0u64;
/// let _ = into_host_buffer(b"value".to_vec(), &mut len);
/// ```
pub unsafe fn into_host_buffer(bytes: Vec<u8>, out_len: *mut u64) -> *mut u8 {
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len() as u64;
    let ptr = Box::into_raw(boxed).cast::<u8>();

    if !out_len.is_null() {
        unsafe { *out_len = len };
    }
    ptr
}

/// Release a buffer produced by [`into_host_buffer`].
///
/// # Safety
///
/// A non-null `ptr` must come from [`into_host_buffer`] with the same `len`,
/// and must not have been released already.
///
/// ```compile_fail
/// use flagbridge_runtime::ffi::marshal::host_free_buffer;
///
/// host_free_buffer(std::ptr::NonNull::<u8>::dangling().as_ptr(), 16);
/// ```
pub unsafe extern "C" fn host_free_buffer(ptr: *mut u8, len: u64) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            ptr,
            len as usize,
        )));
    }
}

/// View a `(ptr, len)` argument passed in by native code.
///
/// # Safety
///
/// A non-null `ptr` must be valid for reads of `len` bytes for `'a`.
pub unsafe fn borrow_bytes<'a>(ptr: *const u8, len: u64) -> Result<&'a [u8], MarshalError> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(MarshalError::NullBuffer { len })
        };
    }
    if len == 0 {
        return Ok(&[]);
    }
    Ok(std::slice::from_raw_parts(ptr, len as usize))
}

/// View a `(ptr, len)` argument as UTF-8 text.
///
/// # Safety
///
/// Same contract as [`borrow_bytes`].
pub unsafe fn borrow_str<'a>(
    ptr: *const u8,
    len: u64,
    context: &'static str,
) -> Result<&'a str, MarshalError> {
    let bytes = borrow_bytes(ptr, len)?;
    std::str::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8 { context })
}
