//! Typed array: one concrete layout shared by a primitive-kind descriptor
//! (five scalar kinds) and a reference-kind descriptor (its own trace
//! callback). Grounded in `runtime/src/array.c`: the kind enum values, the
//! `rt_require_array_obj` (descriptor-identity) vs `rt_require_array_kind`
//! (descriptor identity *and* element-kind tag) double-check, the
//! overflow-checked size arithmetic, and slicing as a byte-for-byte copy.

use crate::header::ObjectHeader;
use crate::thread_state::ThreadState;
use crate::type_desc::{same_type, TypeDescriptor, FLAG_HAS_REFS, FLAG_LEAF, FLAG_VARIABLE_SIZE};

pub const KIND_I64: u32 = 1;
pub const KIND_U64: u32 = 2;
pub const KIND_U8: u32 = 3;
pub const KIND_BOOL: u32 = 4;
pub const KIND_DOUBLE: u32 = 5;
pub const KIND_REF: u32 = 6;

fn element_size_for(kind: u32) -> u64 {
    match kind {
        KIND_U8 | KIND_BOOL => 1,
        KIND_I64 | KIND_U64 | KIND_DOUBLE | KIND_REF => 8,
        _ => crate::trace::panic_generic(format!("unknown array element kind {}", kind)),
    }
}

#[repr(C)]
struct ArrayPayload {
    len: u64,
    element_kind: u32,
    element_size: u32,
}

const PAYLOAD_HEADER_BYTES: u64 = std::mem::size_of::<ArrayPayload>() as u64;

static TYPE_ARRAY_PRIMITIVE: TypeDescriptor = TypeDescriptor {
    type_id: 0x4152_5250,
    flags: FLAG_LEAF | FLAG_VARIABLE_SIZE,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: 0,
    debug_name: "ArrayPrimitive",
    trace_fn: None,
    pointer_offsets: &[],
};

unsafe fn array_trace_ref(obj: *mut ObjectHeader, mark: &mut dyn FnMut(*mut *mut ObjectHeader)) {
    let payload = (*obj).payload_ptr() as *const ArrayPayload;
    if (*payload).element_kind != KIND_REF {
        crate::trace::panic_generic("array_trace_ref: called on non-reference array".to_string());
    }
    let len = (*payload).len;
    let data = ((*obj).payload_ptr() as *mut u8).add(PAYLOAD_HEADER_BYTES as usize) as *mut *mut ObjectHeader;
    for i in 0..len {
        mark(data.add(i as usize));
    }
}

static TYPE_ARRAY_REFERENCE: TypeDescriptor = TypeDescriptor {
    type_id: 0x4152_5252,
    flags: FLAG_HAS_REFS | FLAG_VARIABLE_SIZE,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: 0,
    debug_name: "ArrayReference",
    trace_fn: Some(array_trace_ref),
    pointer_offsets: &[],
};

fn checked_payload_bytes(len: u64, element_size: u64) -> u64 {
    let elements_bytes = len.checked_mul(element_size).unwrap_or_else(|| crate::trace::panic_oom());
    PAYLOAD_HEADER_BYTES.checked_add(elements_bytes).unwrap_or_else(|| crate::trace::panic_oom())
}

fn require_array(obj: *mut ObjectHeader) -> &'static ArrayPayload {
    if obj.is_null() {
        crate::trace::panic_null_deref();
    }
    let actual = unsafe { (*obj).type_desc() };
    if !same_type(actual, &TYPE_ARRAY_PRIMITIVE) && !same_type(actual, &TYPE_ARRAY_REFERENCE) {
        crate::trace::panic_bad_cast(actual.debug_name, "Array");
    }
    unsafe { &*((*obj).payload_ptr() as *const ArrayPayload) }
}

fn require_array_kind(obj: *mut ObjectHeader, expected_kind: u32) -> &'static ArrayPayload {
    let payload = require_array(obj);
    if payload.element_kind != expected_kind {
        crate::trace::panic_generic(format!(
            "array kind mismatch: expected {}, found {}",
            expected_kind, payload.element_kind
        ));
    }
    payload
}

fn data_ptr(obj: *mut ObjectHeader) -> *mut u8 {
    unsafe { ((*obj).payload_ptr() as *mut u8).add(PAYLOAD_HEADER_BYTES as usize) }
}

/// Read-only pointer to a U8 array's raw bytes, for the panic surface's
/// null-terminated-message extraction (`rt_array_data_ptr` in the original
/// runtime). Kind-checked like every other U8 array accessor.
pub fn array_u8_data_ptr(obj: *mut ObjectHeader) -> *const u8 {
    require_array_kind(obj, KIND_U8);
    data_ptr(obj) as *const u8
}

fn bounds_check(index: u64, len: u64) {
    if index >= len {
        crate::trace::panic_generic(format!("array index {} out of bounds (len {})", index, len));
    }
}

fn new_array(ts: &ThreadState, kind: u32, len: u64) -> *mut ObjectHeader {
    let element_size = element_size_for(kind);
    let payload_bytes = checked_payload_bytes(len, element_size);
    let desc = if kind == KIND_REF { &TYPE_ARRAY_REFERENCE } else { &TYPE_ARRAY_PRIMITIVE };
    let obj = ts.alloc_obj(desc, payload_bytes);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut ArrayPayload) };
    payload.len = len;
    payload.element_kind = kind;
    payload.element_size = element_size as u32;
    obj
}

pub fn array_len(obj: *mut ObjectHeader) -> u64 {
    require_array(obj).len
}

macro_rules! scalar_array {
    ($new_fn:ident, $get_fn:ident, $set_fn:ident, $slice_fn:ident, $kind:expr, $value_ty:ty, $store:expr, $load:expr) => {
        pub fn $new_fn(ts: &ThreadState, len: u64) -> *mut ObjectHeader {
            new_array(ts, $kind, len)
        }

        pub fn $get_fn(obj: *mut ObjectHeader, index: u64) -> $value_ty {
            let payload = require_array_kind(obj, $kind);
            bounds_check(index, payload.len);
            let data = data_ptr(obj) as *const u64;
            $load(read_elem(data, payload.element_size, index))
        }

        pub fn $set_fn(obj: *mut ObjectHeader, index: u64, value: $value_ty) {
            let payload = require_array_kind(obj, $kind);
            bounds_check(index, payload.len);
            let data = data_ptr(obj);
            write_elem(data, payload.element_size, index, $store(value));
        }

        pub fn $slice_fn(ts: &ThreadState, obj: *mut ObjectHeader, start: u64, end: u64) -> *mut ObjectHeader {
            array_slice_checked(ts, obj, $kind, start, end)
        }
    };
}

fn read_elem(data: *const u64, element_size: u32, index: u64) -> u64 {
    unsafe {
        match element_size {
            1 => *(data as *const u8).add(index as usize) as u64,
            8 => *(data as *const u64).add(index as usize),
            other => crate::trace::panic_generic(format!("unsupported element size {}", other)),
        }
    }
}

fn write_elem(data: *mut u8, element_size: u32, index: u64, value: u64) {
    unsafe {
        match element_size {
            1 => *data.add(index as usize) = value as u8,
            8 => *(data as *mut u64).add(index as usize) = value,
            other => crate::trace::panic_generic(format!("unsupported element size {}", other)),
        }
    }
}

/// Produces a new, independent array of the expected kind holding a
/// byte-for-byte copy of `[start, end)`. Never an aliased view — for
/// reference arrays, the reference *values* are copied; the referenced
/// targets remain shared. Kind-checked like every other per-kind accessor
/// (`rt_require_array_kind` in the original runtime's `rt_array_slice_*`
/// family), so slicing a `U8` array through the `i64` entry point raises a
/// kind mismatch instead of silently reinterpreting the bytes.
fn array_slice_checked(ts: &ThreadState, obj: *mut ObjectHeader, expected_kind: u32, start: u64, end: u64) -> *mut ObjectHeader {
    let payload = require_array_kind(obj, expected_kind);
    if start > end || end > payload.len {
        crate::trace::panic_generic(format!(
            "invalid slice range [{}, {}) for array of len {}",
            start, end, payload.len
        ));
    }
    let element_size = payload.element_size as u64;
    let count = end - start;
    let new_obj = new_array(ts, expected_kind, count);
    let src = unsafe { data_ptr(obj).add((start * element_size) as usize) };
    let dst = data_ptr(new_obj);
    unsafe { std::ptr::copy_nonoverlapping(src, dst, (count * element_size) as usize) };
    new_obj
}

scalar_array!(array_i64_new, array_i64_get, array_i64_set, array_i64_slice, KIND_I64, i64, |v: i64| v as u64, |raw: u64| raw as i64);
scalar_array!(array_u64_new, array_u64_get, array_u64_set, array_u64_slice, KIND_U64, u64, |v: u64| v, |raw: u64| raw);
scalar_array!(array_u8_new, array_u8_get, array_u8_set, array_u8_slice, KIND_U8, u8, |v: u8| v as u64, |raw: u64| raw as u8);
scalar_array!(
    array_bool_new,
    array_bool_get,
    array_bool_set,
    array_bool_slice,
    KIND_BOOL,
    bool,
    |v: bool| if v { 1u64 } else { 0u64 },
    |raw: u64| raw != 0
);
scalar_array!(
    array_double_new,
    array_double_get,
    array_double_set,
    array_double_slice,
    KIND_DOUBLE,
    f64,
    |v: f64| v.to_bits(),
    |raw: u64| f64::from_bits(raw)
);

pub fn array_ref_new(ts: &ThreadState, len: u64) -> *mut ObjectHeader {
    new_array(ts, KIND_REF, len)
}

pub fn array_ref_get(obj: *mut ObjectHeader, index: u64) -> *mut ObjectHeader {
    let payload = require_array_kind(obj, KIND_REF);
    bounds_check(index, payload.len);
    let data = data_ptr(obj) as *const *mut ObjectHeader;
    unsafe { *data.add(index as usize) }
}

pub fn array_ref_set(obj: *mut ObjectHeader, index: u64, value: *mut ObjectHeader) {
    let payload = require_array_kind(obj, KIND_REF);
    bounds_check(index, payload.len);
    let data = data_ptr(obj) as *mut *mut ObjectHeader;
    unsafe { *data.add(index as usize) = value };
}

pub fn array_ref_slice(ts: &ThreadState, obj: *mut ObjectHeader, start: u64, end: u64) -> *mut ObjectHeader {
    array_slice_checked(ts, obj, KIND_REF, start, end)
}
