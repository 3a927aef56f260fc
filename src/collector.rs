//! Stop-the-world mark-and-sweep over the tracked-object registry.
//!
//! Grounded in `rt_mark_object`/`rt_clear_all_marks`/`rt_mark_from_*`
//! (`runtime/src/gc.c`). That snapshot's `rt_gc_collect` body is shown only
//! through the root-marking step; the sweep phase and the post-sweep
//! threshold bookkeeping are authored fresh here from the invariant list,
//! not copied from an incomplete C body.

use crate::allocator::dealloc_object;
use crate::header::ObjectHeader;
use crate::thread_state::{with_thread_state, TrackedNode};

/// Returns true if `ptr` is the address of a currently tracked object.
/// A linear scan of the registry, same cost model as the original
/// runtime's `rt_is_tracked_object` and the registry it already walks for
/// sweep — no second indexing structure is introduced for this check.
fn is_tracked_object(head: *mut TrackedNode, ptr: *mut ObjectHeader) -> bool {
    let mut node = head;
    while !node.is_null() {
        if unsafe { (*node).obj } == ptr {
            return true;
        }
        node = unsafe { (*node).next };
    }
    false
}

fn mark_value(head: *mut TrackedNode, ptr: *mut ObjectHeader, worklist: &mut Vec<*mut ObjectHeader>) {
    if ptr.is_null() {
        return;
    }
    if !is_tracked_object(head, ptr) {
        return;
    }
    let hdr = unsafe { &*ptr };
    if hdr.is_marked() {
        return;
    }
    hdr.set_marked();
    worklist.push(ptr);
}

fn mark_slot(head: *mut TrackedNode, slot: *mut *mut ObjectHeader, worklist: &mut Vec<*mut ObjectHeader>) {
    let value = unsafe { *slot };
    mark_value(head, value, worklist);
}

fn trace_children(head: *mut TrackedNode, obj: *mut ObjectHeader, worklist: &mut Vec<*mut ObjectHeader>) {
    let hdr = unsafe { &*obj };
    let type_desc = hdr.type_desc();

    if let Some(trace_fn) = type_desc.trace_fn {
        let mut mark = |slot: *mut *mut ObjectHeader| mark_slot(head, slot, worklist);
        unsafe { trace_fn(obj, &mut mark) };
        return;
    }

    if !type_desc.pointer_offsets.is_empty() {
        let base = obj as *mut u8;
        for &offset in type_desc.pointer_offsets {
            let slot = unsafe { base.add(offset) } as *mut *mut ObjectHeader;
            mark_slot(head, slot, worklist);
        }
        return;
    }

    // LEAF (or an empty-offsets descriptor with no trace_fn): no children.
}

/// Runs one full collection cycle: clear marks, mark from roots, close over
/// the mark worklist, sweep unmarked objects, and update threshold
/// bookkeeping.
pub fn collect() {
    with_thread_state(|ts| {
        let head = ts.tracked_head.get();

        // 1. Clear marks.
        let mut node = head;
        while !node.is_null() {
            unsafe { (*(*node).obj).clear_marked() };
            node = unsafe { (*node).next };
        }

        // 2 & 3. Mark roots, then close over the worklist.
        let mut worklist = Vec::new();
        ts.global_roots.borrow().for_each_root_slot(|slot| mark_slot(head, slot, &mut worklist));
        ts.shadow_stack.for_each_root_slot(|slot| mark_slot(head, slot, &mut worklist));

        while let Some(obj) = worklist.pop() {
            trace_children(head, obj, &mut worklist);
        }

        // 4. Sweep.
        let mut live_bytes: u64 = 0;
        let mut prev: *mut TrackedNode = std::ptr::null_mut();
        let mut node = head;
        let mut new_head = head;
        while !node.is_null() {
            let next = unsafe { (*node).next };
            let obj = unsafe { (*node).obj };
            let hdr = unsafe { &*obj };
            if hdr.is_marked() || hdr.is_pinned() {
                hdr.clear_marked();
                live_bytes = live_bytes.saturating_add(hdr.size_bytes);
                prev = node;
            } else {
                if prev.is_null() {
                    new_head = next;
                } else {
                    unsafe { (*prev).next = next };
                }
                let type_desc = hdr.type_desc();
                unsafe { dealloc_object(obj, type_desc) };
                unsafe { drop(Box::from_raw(node)) };
            }
            node = next;
        }
        ts.tracked_head.set(new_head);

        // 5. Bookkeeping.
        let mut counters = ts.counters.borrow_mut();
        let tracked = {
            let mut n = new_head;
            let mut count = 0u64;
            while !n.is_null() {
                count += 1;
                n = unsafe { (*n).next };
            }
            count
        };
        counters.live_bytes = live_bytes;
        counters.allocated_bytes = live_bytes;
        counters.tracked_object_count = tracked;
        counters.next_gc_threshold = ts.config.next_threshold(live_bytes);

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            live_bytes,
            tracked_object_count = tracked,
            next_gc_threshold = counters.next_gc_threshold,
            "collection cycle complete"
        );
    });
}

/// Frees every tracked object and every global root entry, and resets all
/// counters and the shadow stack top to empty. Intended for shutdown and
/// for isolating successive test scenarios in one process.
pub fn reset_state() {
    with_thread_state(|ts| {
        let mut node = ts.tracked_head.get();
        while !node.is_null() {
            let next = unsafe { (*node).next };
            let obj = unsafe { (*node).obj };
            let type_desc = unsafe { (*obj).type_desc() };
            unsafe { dealloc_object(obj, type_desc) };
            unsafe { drop(Box::from_raw(node)) };
            node = next;
        }
        ts.tracked_head.set(std::ptr::null_mut());
        ts.global_roots.borrow_mut().clear();

        let mut counters = ts.counters.borrow_mut();
        counters.allocated_bytes = 0;
        counters.live_bytes = 0;
        counters.tracked_object_count = 0;
        counters.next_gc_threshold = ts.config.min_threshold_bytes;
    });
}

#[cfg(test)]
mod tests {
    use crate::boxed::{box_i64_get, box_i64_new};
    use crate::header::ObjectHeader;
    use crate::shadow_stack::RootFrame;
    use crate::thread_state::{init, shutdown, with_thread_state};
    use crate::type_desc::{TypeDescriptor, FLAG_HAS_REFS};

    // No container in this crate needs the `pointer_offsets` trace
    // strategy (every `HAS_REFS` type here installs a `trace_fn`
    // instead), so it has no coverage elsewhere. This type exists only to
    // exercise that precedence branch directly. The offset is measured
    // from the object base (per §4.1), so the one reference slot sits at
    // the start of the payload, right after the header.
    static SINGLE_SLOT_OFFSETS: [usize; 1] = [std::mem::size_of::<ObjectHeader>()];
    static TYPE_SINGLE_SLOT: TypeDescriptor = TypeDescriptor {
        type_id: 0xC011_EC70,
        flags: FLAG_HAS_REFS,
        abi_version: 1,
        align_bytes: 8,
        fixed_size_bytes: 8,
        debug_name: "SingleSlot",
        trace_fn: None,
        pointer_offsets: &SINGLE_SLOT_OFFSETS,
    };

    #[test]
    fn pointer_offsets_strategy_marks_through_a_struct_slot() {
        init();
        with_thread_state(|ts| {
            let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
            let mut frame = RootFrame::init(&mut slots);
            ts.shadow_stack().push(&mut frame as *mut _);

            let holder = ts.alloc_obj(&TYPE_SINGLE_SLOT, 8);
            let held = box_i64_new(ts, 99);
            let slot = unsafe { (*holder).payload_ptr() as *mut *mut ObjectHeader };
            unsafe { *slot = held };
            frame.slot_store(0, holder);

            super::collect();
            assert_eq!(ts.get_stats().tracked_object_count, 2);
            assert_eq!(box_i64_get(held), 99);

            unsafe { *slot = std::ptr::null_mut() };
            super::collect();
            assert_eq!(ts.get_stats().tracked_object_count, 1);

            frame.slot_store(0, std::ptr::null_mut());
            ts.shadow_stack().pop();
        });
        super::collect();
        with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
        shutdown();
    }

    #[test]
    fn unrooted_allocations_are_fully_reclaimed() {
        init();
        with_thread_state(|ts| {
            for i in 0..200 {
                box_i64_new(ts, i);
            }
            assert_eq!(ts.get_stats().tracked_object_count, 200);
        });
        super::collect();
        with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
        shutdown();
    }

    #[test]
    fn rooted_allocation_survives_collection() {
        init();
        with_thread_state(|ts| {
            let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
            let mut frame = RootFrame::init(&mut slots);
            ts.shadow_stack().push(&mut frame as *mut _);

            let b = box_i64_new(ts, 42);
            frame.slot_store(0, b);
            super::collect();
            assert_eq!(ts.get_stats().tracked_object_count, 1);
            assert_eq!(box_i64_get(frame.slot_load(0)), 42);

            frame.slot_store(0, std::ptr::null_mut());
            ts.shadow_stack().pop();
        });
        super::collect();
        with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
        shutdown();
    }
}
