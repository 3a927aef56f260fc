//! Process-wide registry of root slots that outlive any single call frame
//! (statics, FFI-held handles). Grounded in
//! `rt_gc_register_global_root`/`rt_gc_unregister_global_root` in the
//! original runtime: a singly-linked list, register is idempotent, and
//! unregister silently no-ops if the slot was never registered.

use std::ptr;

use crate::header::ObjectHeader;
use crate::thread_state::ThreadState;

struct GlobalRootNode {
    slot: *mut *mut ObjectHeader,
    next: *mut GlobalRootNode,
}

pub struct GlobalRootRegistry {
    head: *mut GlobalRootNode,
}

impl GlobalRootRegistry {
    pub fn new() -> Self {
        GlobalRootRegistry { head: ptr::null_mut() }
    }

    fn find(&self, slot: *mut *mut ObjectHeader) -> *mut GlobalRootNode {
        let mut node = self.head;
        while !node.is_null() {
            if unsafe { (*node).slot } == slot {
                return node;
            }
            node = unsafe { (*node).next };
        }
        ptr::null_mut()
    }

    /// Registers `slot`. A slot already registered is left untouched — at
    /// most one entry per slot ever exists.
    pub fn register(&mut self, slot: *mut *mut ObjectHeader) {
        if slot.is_null() {
            crate::trace::panic_generic("register_global_root: null slot".to_string());
        }
        if !self.find(slot).is_null() {
            return;
        }
        let node = Box::into_raw(Box::new(GlobalRootNode { slot, next: self.head }));
        self.head = node;
    }

    /// Removes the entry for `slot` if present. Unlike `register`, an
    /// absent slot is not an error: this mirrors the original runtime,
    /// which only panics on a null slot, not on "not registered".
    pub fn unregister(&mut self, slot: *mut *mut ObjectHeader) {
        if slot.is_null() {
            crate::trace::panic_generic("unregister_global_root: null slot".to_string());
        }
        let mut prev: *mut GlobalRootNode = ptr::null_mut();
        let mut node = self.head;
        while !node.is_null() {
            let next = unsafe { (*node).next };
            if unsafe { (*node).slot } == slot {
                if prev.is_null() {
                    self.head = next;
                } else {
                    unsafe { (*prev).next = next };
                }
                unsafe { drop(Box::from_raw(node)) };
                return;
            }
            prev = node;
            node = next;
        }
    }

    pub(crate) fn for_each_root_slot(&self, mut f: impl FnMut(*mut *mut ObjectHeader)) {
        let mut node = self.head;
        while !node.is_null() {
            f(unsafe { (*node).slot });
            node = unsafe { (*node).next };
        }
    }

    /// Frees every registered node and resets the registry to empty. Used
    /// by `reset_state` for shutdown and test isolation.
    pub(crate) fn clear(&mut self) {
        let mut node = self.head;
        while !node.is_null() {
            let next = unsafe { (*node).next };
            unsafe { drop(Box::from_raw(node)) };
            node = next;
        }
        self.head = ptr::null_mut();
    }
}

impl Default for GlobalRootRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GlobalRootRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Registers `slot` as a root of the active thread state.
pub fn register_global_root(ts: &ThreadState, slot: *mut *mut ObjectHeader) {
    ts.global_roots.borrow_mut().register(slot);
}

/// Unregisters `slot` from the active thread state, if present.
pub fn unregister_global_root(ts: &ThreadState, slot: *mut *mut ObjectHeader) {
    ts.global_roots.borrow_mut().unregister(slot);
}
