//! Growable reference vector: a `{len, storage}` object referencing a
//! separate `{capacity, elements}` storage block. Grounded in
//! `runtime/src/vec.c`: the storage trace callback marks every element slot
//! up to `capacity` (not `len`, since slots beyond `len` may still hold
//! stale references from a previous shrink-by-reuse, though this runtime
//! never shrinks); `rt_vec_new` roots the initial capacity-4 storage across
//! the vector object's own allocation, mirroring `strbuf_new`.

use crate::header::ObjectHeader;
use crate::shadow_stack::RootFrame;
use crate::thread_state::ThreadState;
use crate::type_desc::{checked_cast, TypeDescriptor, FLAG_HAS_REFS, FLAG_VARIABLE_SIZE};

#[repr(C)]
struct StorageHeader {
    capacity: u64,
}

const STORAGE_HEADER_BYTES: u64 = std::mem::size_of::<StorageHeader>() as u64;

unsafe fn storage_trace(obj: *mut ObjectHeader, mark: &mut dyn FnMut(*mut *mut ObjectHeader)) {
    let header = &*((*obj).payload_ptr() as *const StorageHeader);
    let elements = ((*obj).payload_ptr() as *mut u8).add(STORAGE_HEADER_BYTES as usize) as *mut *mut ObjectHeader;
    for i in 0..header.capacity {
        mark(elements.add(i as usize));
    }
}

static TYPE_VEC_STORAGE: TypeDescriptor = TypeDescriptor {
    type_id: 0x5645_4331,
    flags: FLAG_HAS_REFS | FLAG_VARIABLE_SIZE,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: 0,
    debug_name: "VecStorage",
    trace_fn: Some(storage_trace),
    pointer_offsets: &[],
};

#[repr(C)]
struct VecPayload {
    len: u64,
    storage: *mut ObjectHeader,
}

const VEC_PAYLOAD_BYTES: u64 = std::mem::size_of::<VecPayload>() as u64;
const STORAGE_SLOT_OFFSET: usize = std::mem::size_of::<u64>();

unsafe fn vec_trace(obj: *mut ObjectHeader, mark: &mut dyn FnMut(*mut *mut ObjectHeader)) {
    let payload = (*obj).payload_ptr() as *mut u8;
    let slot = payload.add(STORAGE_SLOT_OFFSET) as *mut *mut ObjectHeader;
    mark(slot);
}

static TYPE_VEC: TypeDescriptor = TypeDescriptor {
    type_id: 0x5645_4301,
    flags: FLAG_HAS_REFS,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: VEC_PAYLOAD_BYTES as u32,
    debug_name: "RefVec",
    trace_fn: Some(vec_trace),
    pointer_offsets: &[],
};

fn storage_new(ts: &ThreadState, capacity: u64) -> *mut ObjectHeader {
    let element_bytes = capacity.checked_mul(8).unwrap_or_else(|| crate::trace::panic_oom());
    let payload_bytes = STORAGE_HEADER_BYTES.checked_add(element_bytes).unwrap_or_else(|| crate::trace::panic_oom());
    let obj = ts.alloc_obj(&TYPE_VEC_STORAGE, payload_bytes);
    let header = unsafe { &mut *((*obj).payload_ptr() as *mut StorageHeader) };
    header.capacity = capacity;
    obj
}

fn storage_capacity(storage: *mut ObjectHeader) -> u64 {
    unsafe { (&*((*storage).payload_ptr() as *const StorageHeader)).capacity }
}

fn storage_elements_ptr(storage: *mut ObjectHeader) -> *mut *mut ObjectHeader {
    unsafe { ((*storage).payload_ptr() as *mut u8).add(STORAGE_HEADER_BYTES as usize) as *mut *mut ObjectHeader }
}

fn require(obj: *mut ObjectHeader) -> &'static mut VecPayload {
    checked_cast(obj, &TYPE_VEC);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut VecPayload) };
    if payload.storage.is_null() {
        crate::trace::panic_null_deref();
    }
    payload
}

/// Allocates an empty vector with an initial storage capacity taken from
/// the active [`crate::config::GcConfig`] (4 by default), rooting the
/// storage across the vector object's own allocation.
pub fn vec_new(ts: &ThreadState) -> *mut ObjectHeader {
    let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
    let mut frame = RootFrame::init(&mut slots);
    ts.shadow_stack().push(&mut frame as *mut _);

    let storage = storage_new(ts, ts.config.initial_vector_capacity);
    frame.slot_store(0, storage);

    let obj = ts.alloc_obj(&TYPE_VEC, VEC_PAYLOAD_BYTES);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut VecPayload) };
    payload.len = 0;
    payload.storage = frame.slot_load(0);

    ts.shadow_stack().pop();
    obj
}

pub fn vec_len(obj: *mut ObjectHeader) -> u64 {
    require(obj).len
}

fn grow_if_needed(ts: &ThreadState, obj: *mut ObjectHeader) {
    let (len, storage) = {
        let payload = require(obj);
        (payload.len, payload.storage)
    };
    let capacity = storage_capacity(storage);
    if len < capacity {
        return;
    }
    let doubled = capacity.checked_mul(2).unwrap_or_else(|| crate::trace::panic_oom());
    let next_capacity = doubled.max(4);

    let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
    let mut frame = RootFrame::init(&mut slots);
    ts.shadow_stack().push(&mut frame as *mut _);

    let new_storage = storage_new(ts, next_capacity);
    frame.slot_store(0, new_storage);
    let src = storage_elements_ptr(storage);
    let dst = storage_elements_ptr(new_storage);
    unsafe { std::ptr::copy_nonoverlapping(src, dst, len as usize) };

    let payload = require(obj);
    payload.storage = frame.slot_load(0);

    ts.shadow_stack().pop();
}

pub fn vec_push(ts: &ThreadState, obj: *mut ObjectHeader, value: *mut ObjectHeader) {
    grow_if_needed(ts, obj);
    let payload = require(obj);
    let slot = unsafe { storage_elements_ptr(payload.storage).add(payload.len as usize) };
    unsafe { *slot = value };
    payload.len += 1;
}

pub fn vec_get(obj: *mut ObjectHeader, index: u64) -> *mut ObjectHeader {
    let payload = require(obj);
    if index >= payload.len {
        crate::trace::panic_generic(format!("vector index {} out of bounds (len {})", index, payload.len));
    }
    unsafe { *storage_elements_ptr(payload.storage).add(index as usize) }
}

pub fn vec_set(obj: *mut ObjectHeader, index: u64, value: *mut ObjectHeader) {
    let payload = require(obj);
    if index >= payload.len {
        crate::trace::panic_generic(format!("vector index {} out of bounds (len {})", index, payload.len));
    }
    unsafe { *storage_elements_ptr(payload.storage).add(index as usize) = value };
}
