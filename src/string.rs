//! Immutable, byte-indexed string. Grounded in `runtime/src/str.c`'s
//! `RtStrObj`/`g_rt_type_str` and `rt_str_from_bytes`'s copy-on-construct
//! idiom. `str_slice`/`str_from_char`/`str_data_ptr` are declared in
//! `runtime/include/str.h` but not present in the retrieved `str.c` body;
//! they are authored here following the same copy-construction idiom as
//! `str_from_bytes`.

use crate::header::ObjectHeader;
use crate::thread_state::ThreadState;
use crate::type_desc::{checked_cast, TypeDescriptor, FLAG_LEAF, FLAG_VARIABLE_SIZE};

#[repr(C)]
struct StrPayload {
    len: u64,
}

const PAYLOAD_HEADER_BYTES: u64 = std::mem::size_of::<StrPayload>() as u64;

static TYPE_STR: TypeDescriptor = TypeDescriptor {
    type_id: 0x5354_5201,
    flags: FLAG_LEAF | FLAG_VARIABLE_SIZE,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: 0,
    debug_name: "Str",
    trace_fn: None,
    pointer_offsets: &[],
};

fn require(obj: *mut ObjectHeader) -> &'static StrPayload {
    checked_cast(obj, &TYPE_STR);
    unsafe { &*((*obj).payload_ptr() as *const StrPayload) }
}

fn bytes_ptr(obj: *mut ObjectHeader) -> *const u8 {
    unsafe { ((*obj).payload_ptr() as *const u8).add(PAYLOAD_HEADER_BYTES as usize) }
}

/// Copies `bytes` into a freshly allocated string. Panics if `len > 0` and
/// `bytes` is null, matching `rt_str_from_bytes`'s guard.
pub fn str_from_bytes(ts: &ThreadState, bytes: *const u8, len: u64) -> *mut ObjectHeader {
    if len > 0 && bytes.is_null() {
        crate::trace::panic_null_deref();
    }
    let payload_bytes = PAYLOAD_HEADER_BYTES.checked_add(len).unwrap_or_else(|| crate::trace::panic_oom());
    let obj = ts.alloc_obj(&TYPE_STR, payload_bytes);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut StrPayload) };
    payload.len = len;
    if len > 0 {
        let dst = unsafe { ((*obj).payload_ptr() as *mut u8).add(PAYLOAD_HEADER_BYTES as usize) };
        unsafe { std::ptr::copy_nonoverlapping(bytes, dst, len as usize) };
    }
    obj
}

pub fn str_from_char(ts: &ThreadState, byte: u8) -> *mut ObjectHeader {
    str_from_bytes(ts, &byte as *const u8, 1)
}

pub fn str_len(obj: *mut ObjectHeader) -> u64 {
    require(obj).len
}

pub fn str_get_u8(obj: *mut ObjectHeader, index: u64) -> u8 {
    let payload = require(obj);
    if index >= payload.len {
        crate::trace::panic_generic(format!("string index {} out of bounds (len {})", index, payload.len));
    }
    unsafe { *bytes_ptr(obj).add(index as usize) }
}

/// Returns a new string holding a copy of `[begin, end)` — never a view
/// onto the source.
pub fn str_slice(ts: &ThreadState, obj: *mut ObjectHeader, begin: u64, end: u64) -> *mut ObjectHeader {
    let payload = require(obj);
    if begin > end || end > payload.len {
        crate::trace::panic_generic(format!(
            "invalid slice range [{}, {}) for string of len {}",
            begin, end, payload.len
        ));
    }
    let src = unsafe { bytes_ptr(obj).add(begin as usize) };
    str_from_bytes(ts, src, end - begin)
}

/// Returns a read-only pointer to the string's bytes, valid until the next
/// collection that could reclaim this string (i.e. while it remains
/// rooted).
pub fn str_data_ptr(obj: *mut ObjectHeader) -> *const u8 {
    require(obj);
    bytes_ptr(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_state::{init, shutdown, with_thread_state};

    #[test]
    fn from_bytes_round_trips_each_byte() {
        init();
        with_thread_state(|ts| {
            let data = b"hello";
            let s = str_from_bytes(ts, data.as_ptr(), data.len() as u64);
            assert_eq!(str_len(s), 5);
            for (i, b) in data.iter().enumerate() {
                assert_eq!(str_get_u8(s, i as u64), *b);
            }
        });
        shutdown();
    }

    #[test]
    fn slice_copies_independently_of_source() {
        init();
        with_thread_state(|ts| {
            let data = b"abcdef";
            let s = str_from_bytes(ts, data.as_ptr(), data.len() as u64);
            let sl = str_slice(ts, s, 1, 3);
            assert_eq!(str_len(sl), 2);
            assert_eq!(str_get_u8(sl, 0), b'b');
            assert_eq!(str_get_u8(sl, 1), b'c');
        });
        shutdown();
    }
}
