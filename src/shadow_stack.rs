//! Explicit root frames the mutator pushes/pops around its own call frames.
//!
//! `Starlight-JS-comet`'s `ShadowStack` links a singly-linked list of
//! type-erased, `dyn`-vtable-carrying entries through a `Cell` head pointer,
//! with a `letroot!` macro building each entry in place on the native stack.
//! This runtime's roots are uniformly `*mut ObjectHeader` slots (there is no
//! per-type rooting, only "is this a managed reference or not"), so the
//! vtable machinery drops out entirely: a frame is just a previous-frame
//! link plus a caller-owned slot array, matching `RtRootFrame` in the
//! original runtime. The `Cell<*mut RootFrame>` head and the Drop-based
//! auto-pop guard are kept, since both are genuinely useful idioms here too.

use std::cell::Cell;
use std::ptr;

use crate::header::ObjectHeader;

/// One activation's root frame. `slots` is caller-owned (typically a stack
/// array); this struct only borrows it for the frame's lifetime.
#[repr(C)]
pub struct RootFrame {
    prev: *mut RootFrame,
    slot_count: usize,
    slots: *mut *mut ObjectHeader,
}

impl RootFrame {
    /// Build a frame over `slots`, clearing every slot to "no reference".
    /// Does not push the frame; call [`ShadowStack::push`] to do that.
    pub fn init(slots: &mut [*mut ObjectHeader]) -> RootFrame {
        for slot in slots.iter_mut() {
            *slot = ptr::null_mut();
        }
        RootFrame {
            prev: ptr::null_mut(),
            slot_count: slots.len(),
            slots: slots.as_mut_ptr(),
        }
    }

    #[inline]
    fn slot_ptr(&self, index: usize) -> *mut *mut ObjectHeader {
        if index >= self.slot_count {
            crate::trace::panic_generic(format!(
                "root frame slot index {} out of range (count {})",
                index, self.slot_count
            ));
        }
        unsafe { self.slots.add(index) }
    }

    pub fn slot_store(&self, index: usize, value: *mut ObjectHeader) {
        unsafe { *self.slot_ptr(index) = value };
    }

    pub fn slot_load(&self, index: usize) -> *mut ObjectHeader {
        unsafe { *self.slot_ptr(index) }
    }
}

/// Process-wide (per mutator thread) chain of pushed root frames.
pub struct ShadowStack {
    head: Cell<*mut RootFrame>,
}

impl ShadowStack {
    pub fn new() -> Self {
        ShadowStack { head: Cell::new(ptr::null_mut()) }
    }

    /// Links `frame` above the current top. `frame` must outlive the
    /// matching `pop`.
    pub fn push(&self, frame: *mut RootFrame) {
        if frame.is_null() {
            crate::trace::panic_generic("push_roots: null frame".to_string());
        }
        unsafe { (*frame).prev = self.head.get() };
        self.head.set(frame);
    }

    /// Detaches the top frame. Panics with "shadow stack underflow" if no
    /// frame is currently pushed — there is no silent no-op path.
    pub fn pop(&self) {
        let top = self.head.get();
        if top.is_null() {
            crate::trace::panic_generic("shadow stack underflow".to_string());
        }
        let prev = unsafe { (*top).prev };
        self.head.set(prev);
    }

    pub(crate) fn top(&self) -> *mut RootFrame {
        self.head.get()
    }

    /// Visits every slot of every pushed frame, top-down, calling `f` with
    /// the address of each slot so the collector can mark through it.
    pub(crate) fn for_each_root_slot(&self, mut f: impl FnMut(*mut *mut ObjectHeader)) {
        let mut frame = self.head.get();
        while !frame.is_null() {
            let f_ref = unsafe { &*frame };
            for i in 0..f_ref.slot_count {
                f(f_ref.slot_ptr(i));
            }
            frame = f_ref.prev;
        }
    }
}

impl Default for ShadowStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Push-frame-now, pop-on-drop guard, convenient from Rust call sites (the
/// spec's C ABI surface exposes the raw push/pop instead).
pub struct RootGuard<'a> {
    stack: &'a ShadowStack,
}

impl<'a> RootGuard<'a> {
    pub fn new(stack: &'a ShadowStack, frame: &mut RootFrame) -> Self {
        stack.push(frame as *mut RootFrame);
        RootGuard { stack }
    }
}

impl<'a> Drop for RootGuard<'a> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_restores_previous_top() {
        let stack = ShadowStack::new();
        let mut slots_a = [ptr::null_mut::<ObjectHeader>(); 1];
        let mut frame_a = RootFrame::init(&mut slots_a);
        stack.push(&mut frame_a as *mut _);
        assert_eq!(stack.top(), &mut frame_a as *mut _);

        let mut slots_b = [ptr::null_mut::<ObjectHeader>(); 2];
        let mut frame_b = RootFrame::init(&mut slots_b);
        stack.push(&mut frame_b as *mut _);
        assert_eq!(stack.top(), &mut frame_b as *mut _);

        stack.pop();
        assert_eq!(stack.top(), &mut frame_a as *mut _);
        stack.pop();
        assert!(stack.top().is_null());
    }

    #[test]
    #[should_panic(expected = "shadow stack underflow")]
    fn pop_without_push_panics() {
        let stack = ShadowStack::new();
        stack.pop();
    }

    #[test]
    fn slot_store_and_load_round_trip() {
        let mut slots = [ptr::null_mut::<ObjectHeader>(); 3];
        let frame = RootFrame::init(&mut slots);
        let sentinel = 0x1000 as *mut ObjectHeader;
        frame.slot_store(1, sentinel);
        assert_eq!(frame.slot_load(1), sentinel);
        assert!(frame.slot_load(0).is_null());
    }
}
