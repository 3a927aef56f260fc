//! Obtains zeroed memory for one managed object and tracks it.
//!
//! Grounded in `rt_alloc_obj` (`runtime/src/runtime.c`). That snapshot's
//! body only `calloc`s and panics on failure; it does not show the
//! maybe-collect-before-allocate or retry-once-on-failure steps the
//! invariant list requires, so those are authored fresh here rather than
//! copied from the incomplete snapshot.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::{align_of, size_of};

use crate::header::ObjectHeader;
use crate::thread_state::{ThreadState, TrackedNode};
use crate::type_desc::TypeDescriptor;

fn checked_total_size(payload_bytes: u64) -> u64 {
    let header_bytes = size_of::<ObjectHeader>() as u64;
    header_bytes.checked_add(payload_bytes).unwrap_or_else(|| crate::trace::panic_oom())
}

fn layout_for(total_bytes: u64, type_desc: &TypeDescriptor) -> Layout {
    let align = (type_desc.align_bytes as usize).max(align_of::<ObjectHeader>());
    Layout::from_size_align(total_bytes as usize, align).unwrap_or_else(|_| crate::trace::panic_oom())
}

impl ThreadState {
    /// Tracks a freshly allocated object: prepends a registry node and
    /// folds its size into `allocated_bytes`/`tracked_object_count`. Public
    /// (matching `rt_gc_track_allocation` in the external symbol surface,
    /// §6) for emitted code that constructs a header itself rather than
    /// going through `alloc_obj` end to end; `alloc_obj` itself calls this
    /// for the common case.
    pub fn track_allocation(&self, obj: *mut ObjectHeader, size_bytes: u64) {
        let node = Box::into_raw(Box::new(TrackedNode { obj, next: self.tracked_head.get() }));
        self.tracked_head.set(node);
        let mut c = self.counters.borrow_mut();
        c.allocated_bytes = c.allocated_bytes.saturating_add(size_bytes);
        c.tracked_object_count += 1;
    }

    /// Runs a collection if the projected total after allocating `upcoming`
    /// more bytes would cross the current threshold.
    pub fn maybe_collect(&self, upcoming: u64) {
        let projected = {
            let c = self.counters.borrow();
            c.allocated_bytes.saturating_add(upcoming)
        };
        let threshold = self.counters.borrow().next_gc_threshold;
        if projected >= threshold {
            #[cfg(feature = "gc_logging")]
            tracing::trace!(upcoming, threshold, "maybe_collect triggering collection");
            crate::collector::collect();
        }
    }

    /// Allocates a zeroed object of `type_desc` with `payload_bytes` of
    /// payload, registers it, and returns the header pointer. Fails with
    /// OOM (after one retry following a forced collection) if memory
    /// cannot be obtained.
    pub fn alloc_obj(&self, type_desc: &'static TypeDescriptor, payload_bytes: u64) -> *mut ObjectHeader {
        let total = checked_total_size(payload_bytes);
        self.maybe_collect(total);

        let layout = layout_for(total, type_desc);
        let mut ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            crate::collector::collect();
            ptr = unsafe { alloc_zeroed(layout) };
            if ptr.is_null() {
                crate::trace::panic_oom();
            }
        }

        let header = ptr as *mut ObjectHeader;
        unsafe {
            (*header).type_desc = type_desc as *const TypeDescriptor;
            (*header).size_bytes = total;
            (*header).gc_flags = std::cell::Cell::new(0);
        }
        self.track_allocation(header, total);
        header
    }
}

/// Frees the raw allocation backing `obj`. Only the sweeper and
/// `reset_state` may call this — by the time it runs, `obj` must already be
/// unlinked from the tracked-object registry.
pub(crate) unsafe fn dealloc_object(obj: *mut ObjectHeader, type_desc: &TypeDescriptor) {
    let size_bytes = (*obj).size_bytes;
    let layout = layout_for(size_bytes, type_desc);
    dealloc(obj as *mut u8, layout);
}

#[cfg(test)]
mod tests {
    use crate::thread_state::{init, shutdown, with_thread_state};
    use crate::type_desc::{TypeDescriptor, FLAG_LEAF};

    static LEAF_TYPE: TypeDescriptor = TypeDescriptor {
        type_id: 0xDEAD_0001,
        flags: FLAG_LEAF,
        abi_version: 1,
        align_bytes: 8,
        fixed_size_bytes: 8,
        debug_name: "test-leaf",
        trace_fn: None,
        pointer_offsets: &[],
    };

    #[test]
    fn alloc_zeroes_payload_and_tracks() {
        init();
        with_thread_state(|ts| {
            let header = ts.alloc_obj(&LEAF_TYPE, 8);
            let payload = unsafe { (*header).payload_ptr() as *const u64 };
            assert_eq!(unsafe { *payload }, 0);
            assert_eq!(ts.get_stats().tracked_object_count, 1);
        });
        shutdown();
    }
}
