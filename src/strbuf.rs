//! Mutable, growable string buffer: a `{len, storage}` object referencing a
//! separate `{capacity, bytes}` storage block. Grounded in
//! `runtime/src/strbuf.c`: both `rt_strbuf_new` and `rt_strbuf_reserve` root
//! the newly allocated storage in a temporary one-slot frame before
//! allocating again (the buffer object itself, or — on reserve — before
//! copying into it), so a collection triggered by that second allocation
//! cannot reclaim the storage out from under the in-progress construction.

use crate::header::ObjectHeader;
use crate::shadow_stack::RootFrame;
use crate::thread_state::ThreadState;
use crate::type_desc::{checked_cast, TypeDescriptor, FLAG_HAS_REFS, FLAG_LEAF, FLAG_VARIABLE_SIZE};

#[repr(C)]
struct StorageHeader {
    capacity: u64,
}

const STORAGE_HEADER_BYTES: u64 = std::mem::size_of::<StorageHeader>() as u64;

static TYPE_STRBUF_STORAGE: TypeDescriptor = TypeDescriptor {
    type_id: 0x5342_5331,
    flags: FLAG_LEAF | FLAG_VARIABLE_SIZE,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: 0,
    debug_name: "StrBufStorage",
    trace_fn: None,
    pointer_offsets: &[],
};

#[repr(C)]
struct BufPayload {
    len: u64,
    storage: *mut ObjectHeader,
}

const BUF_PAYLOAD_BYTES: u64 = std::mem::size_of::<BufPayload>() as u64;
const STORAGE_SLOT_OFFSET: usize = std::mem::size_of::<u64>();

unsafe fn strbuf_trace(obj: *mut ObjectHeader, mark: &mut dyn FnMut(*mut *mut ObjectHeader)) {
    let payload = (*obj).payload_ptr() as *mut u8;
    let slot = payload.add(STORAGE_SLOT_OFFSET) as *mut *mut ObjectHeader;
    mark(slot);
}

static TYPE_STRBUF: TypeDescriptor = TypeDescriptor {
    type_id: 0x5342_4601,
    flags: FLAG_HAS_REFS,
    abi_version: 1,
    align_bytes: 8,
    fixed_size_bytes: BUF_PAYLOAD_BYTES as u32,
    debug_name: "StrBuf",
    trace_fn: Some(strbuf_trace),
    pointer_offsets: &[],
};

fn storage_new(ts: &ThreadState, capacity: u64) -> *mut ObjectHeader {
    let payload_bytes = STORAGE_HEADER_BYTES.checked_add(capacity).unwrap_or_else(|| crate::trace::panic_oom());
    let obj = ts.alloc_obj(&TYPE_STRBUF_STORAGE, payload_bytes);
    let header = unsafe { &mut *((*obj).payload_ptr() as *mut StorageHeader) };
    header.capacity = capacity;
    obj
}

fn storage_bytes_ptr(storage: *mut ObjectHeader) -> *mut u8 {
    unsafe { ((*storage).payload_ptr() as *mut u8).add(STORAGE_HEADER_BYTES as usize) }
}

fn storage_capacity(storage: *mut ObjectHeader) -> u64 {
    unsafe { (&*((*storage).payload_ptr() as *const StorageHeader)).capacity }
}

fn require(obj: *mut ObjectHeader) -> &'static mut BufPayload {
    checked_cast(obj, &TYPE_STRBUF);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut BufPayload) };
    if payload.storage.is_null() {
        crate::trace::panic_null_deref();
    }
    payload
}

/// Allocates a buffer of the given initial capacity, rooting the storage
/// block across the buffer object's own allocation.
pub fn strbuf_new(ts: &ThreadState, capacity: u64) -> *mut ObjectHeader {
    let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
    let mut frame = RootFrame::init(&mut slots);
    ts.shadow_stack().push(&mut frame as *mut _);

    let storage = storage_new(ts, capacity);
    frame.slot_store(0, storage);

    let obj = ts.alloc_obj(&TYPE_STRBUF, BUF_PAYLOAD_BYTES);
    let payload = unsafe { &mut *((*obj).payload_ptr() as *mut BufPayload) };
    payload.len = 0;
    payload.storage = frame.slot_load(0);

    ts.shadow_stack().pop();
    obj
}

pub fn strbuf_from_str(ts: &ThreadState, str_obj: *mut ObjectHeader) -> *mut ObjectHeader {
    let len = crate::string::str_len(str_obj);
    let buf = strbuf_new(ts, len);
    let payload = require(buf);
    let dst = storage_bytes_ptr(payload.storage);
    let src = crate::string::str_data_ptr(str_obj);
    if len > 0 {
        unsafe { std::ptr::copy_nonoverlapping(src, dst, len as usize) };
    }
    payload.len = len;
    buf
}

pub fn strbuf_len(obj: *mut ObjectHeader) -> u64 {
    require(obj).len
}

/// Grows backing storage to at least `new_capacity`, preserving the first
/// `len` bytes. No-op if already large enough. Roots the grown storage
/// across its own allocation before copying into it.
pub fn strbuf_reserve(ts: &ThreadState, obj: *mut ObjectHeader, new_capacity: u64) {
    let (len, storage) = {
        let payload = require(obj);
        (payload.len, payload.storage)
    };
    if new_capacity <= storage_capacity(storage) {
        return;
    }

    let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
    let mut frame = RootFrame::init(&mut slots);
    ts.shadow_stack().push(&mut frame as *mut _);

    let new_storage = storage_new(ts, new_capacity);
    frame.slot_store(0, new_storage);
    if len > 0 {
        unsafe { std::ptr::copy_nonoverlapping(storage_bytes_ptr(storage), storage_bytes_ptr(new_storage), len as usize) };
    }

    let payload = require(obj);
    payload.storage = frame.slot_load(0);

    ts.shadow_stack().pop();
}

pub fn strbuf_get_u8(obj: *mut ObjectHeader, index: u64) -> u8 {
    let payload = require(obj);
    if index >= payload.len {
        crate::trace::panic_generic(format!("string buffer index {} out of bounds (len {})", index, payload.len));
    }
    unsafe { *storage_bytes_ptr(payload.storage).add(index as usize) }
}

pub fn strbuf_set_u8(obj: *mut ObjectHeader, index: u64, value: u8) {
    let payload = require(obj);
    if index >= payload.len {
        crate::trace::panic_generic(format!("string buffer index {} out of bounds (len {})", index, payload.len));
    }
    unsafe { *storage_bytes_ptr(payload.storage).add(index as usize) = value };
}

pub fn strbuf_to_str(ts: &ThreadState, obj: *mut ObjectHeader) -> *mut ObjectHeader {
    let payload = require(obj);
    crate::string::str_from_bytes(ts, storage_bytes_ptr(payload.storage), payload.len)
}
