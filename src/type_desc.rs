//! Static, immutable per-kind metadata.
//!
//! `Starlight-JS-comet` keys per-type tracing behavior off a
//! `TypeId`-indexed global table (`internal::gc_info::GC_TABLE`) populated
//! the first time a generic `GCInfoTrait<T>` is touched. This runtime has a
//! small, fixed set of concrete object kinds known up front, so each one
//! gets a single `'static TypeDescriptor` const instead of a table lookup —
//! descriptors are compared by pointer identity, matching
//! `rt_require_box_*_obj`'s pointer-equality checks in the original
//! runtime.

use crate::header::ObjectHeader;

pub const FLAG_HAS_REFS: u8 = 1 << 0;
pub const FLAG_VARIABLE_SIZE: u8 = 1 << 1;
pub const FLAG_LEAF: u8 = 1 << 2;

/// Marks every outgoing reference an object owns by calling `mark` on the
/// address of each reference slot. Must not allocate and must not call back
/// into the collector.
pub type TraceFn = unsafe fn(obj: *mut ObjectHeader, mark: &mut dyn FnMut(*mut *mut ObjectHeader));

/// Immutable, process-lifetime description of one managed object kind.
///
/// Trace-strategy precedence (checked in this order): `trace_fn` if set,
/// else `pointer_offsets` if non-empty, else leaf (no children). Exactly one
/// of these must describe the type; mixing a `trace_fn` with a non-empty
/// `pointer_offsets` on the same descriptor is a programming error in this
/// crate, not a runtime-checked condition.
pub struct TypeDescriptor {
    pub type_id: u32,
    pub flags: u8,
    pub abi_version: u16,
    pub align_bytes: u16,
    pub fixed_size_bytes: u32,
    pub debug_name: &'static str,
    pub trace_fn: Option<TraceFn>,
    pub pointer_offsets: &'static [usize],
}

impl TypeDescriptor {
    #[inline(always)]
    pub fn has_refs(&self) -> bool {
        self.flags & FLAG_HAS_REFS != 0
    }

    #[inline(always)]
    pub fn is_variable_size(&self) -> bool {
        self.flags & FLAG_VARIABLE_SIZE != 0
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.flags & FLAG_LEAF != 0
    }
}

/// Compares two descriptor references by identity, matching the original
/// runtime's pointer-equality type checks (`rt_require_box_i64_obj`, etc).
#[inline(always)]
pub fn same_type(a: &'static TypeDescriptor, b: &'static TypeDescriptor) -> bool {
    std::ptr::eq(a, b)
}

/// The external-interface `checked_cast`: verifies `obj` is non-null and
/// carries exactly `expected`'s descriptor identity, panicking
/// (null-deref or bad-cast) otherwise. Every container's own `require`
/// helper is this check plus that container's own payload projection.
pub fn checked_cast(obj: *mut ObjectHeader, expected: &'static TypeDescriptor) -> *mut ObjectHeader {
    if obj.is_null() {
        crate::trace::panic_null_deref();
    }
    let actual = unsafe { (*obj).type_desc() };
    if !same_type(actual, expected) {
        crate::trace::panic_bad_cast(actual.debug_name, expected.debug_name);
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    static TYPE_A: TypeDescriptor = TypeDescriptor {
        type_id: 1,
        flags: FLAG_LEAF,
        abi_version: 1,
        align_bytes: 8,
        fixed_size_bytes: 8,
        debug_name: "A",
        trace_fn: None,
        pointer_offsets: &[],
    };
    static TYPE_B: TypeDescriptor = TypeDescriptor {
        type_id: 2,
        flags: FLAG_LEAF,
        abi_version: 1,
        align_bytes: 8,
        fixed_size_bytes: 8,
        debug_name: "B",
        trace_fn: None,
        pointer_offsets: &[],
    };

    #[test]
    fn checked_cast_accepts_matching_identity() {
        let mut header = ObjectHeader {
            type_desc: &TYPE_A as *const TypeDescriptor,
            size_bytes: 8,
            gc_flags: std::cell::Cell::new(0),
        };
        assert_eq!(checked_cast(&mut header as *mut _, &TYPE_A), &mut header as *mut _);
    }

    #[test]
    #[should_panic(expected = "bad cast")]
    fn checked_cast_rejects_mismatched_identity() {
        let mut header = ObjectHeader {
            type_desc: &TYPE_A as *const TypeDescriptor,
            size_bytes: 8,
            gc_flags: std::cell::Cell::new(0),
        };
        checked_cast(&mut header as *mut _, &TYPE_B);
    }

    #[test]
    #[should_panic(expected = "null dereference")]
    fn checked_cast_rejects_null() {
        checked_cast(std::ptr::null_mut(), &TYPE_A);
    }
}
