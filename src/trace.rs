//! Source-location trace stack and the panic dispatch that reads it.
//!
//! Grounded in `runtime/src/panic.c`: `rt_print_stacktrace` walks the
//! `trace_top` chain printing `"  at {function} ({file}:{line}:{column})"`,
//! and `rt_abort_with_message` prints the message, the active location (if
//! any), the full stacktrace, then calls `abort()`. The five panic
//! entry points (`rt_panic`, `rt_panic_null_deref`, `rt_panic_bad_cast`,
//! `rt_panic_oom`, `rt_panic_null_term_array`) all funnel through that one
//! sink; this module mirrors that funnel shape.

use std::cell::Cell;
use std::ptr;

use crate::error::{PanicKind, RuntimePanic, SourceLocation, TraceFrameSnapshot};
use crate::header::ObjectHeader;

/// One emitted-code call frame on the trace stack. Mutator code pushes one
/// of these at function entry and pops it at exit; `line`/`column` are
/// updated before each potentially-failing operation.
#[repr(C)]
pub struct TraceFrame {
    prev: *mut TraceFrame,
    pub function_name: &'static str,
    pub file_path: &'static str,
    pub line: Cell<u32>,
    pub column: Cell<u32>,
}

impl TraceFrame {
    pub fn new(function_name: &'static str, file_path: &'static str) -> TraceFrame {
        TraceFrame {
            prev: ptr::null_mut(),
            function_name,
            file_path,
            line: Cell::new(0),
            column: Cell::new(0),
        }
    }

    pub fn set_location(&self, line: u32, column: u32) {
        self.line.set(line);
        self.column.set(column);
    }
}

/// Process-wide chain of currently active trace frames.
pub struct TraceStack {
    top: Cell<*mut TraceFrame>,
}

impl TraceStack {
    pub fn new() -> Self {
        TraceStack { top: Cell::new(ptr::null_mut()) }
    }

    pub fn push(&self, frame: *mut TraceFrame) {
        unsafe { (*frame).prev = self.top.get() };
        self.top.set(frame);
    }

    pub fn pop(&self) {
        let top = self.top.get();
        if !top.is_null() {
            self.top.set(unsafe { (*top).prev });
        }
    }

    pub fn top(&self) -> *mut TraceFrame {
        self.top.get()
    }

    fn snapshot(&self) -> (Option<SourceLocation>, Vec<TraceFrameSnapshot>) {
        let mut frames = Vec::new();
        let mut frame = self.top.get();
        let mut location = None;
        while !frame.is_null() {
            let f = unsafe { &*frame };
            let snap = TraceFrameSnapshot {
                function_name: f.function_name,
                file_path: f.file_path,
                line: f.line.get(),
                column: f.column.get(),
            };
            if location.is_none() {
                location = Some(SourceLocation { line: snap.line, column: snap.column });
            }
            frames.push(snap);
            frame = f.prev;
        }
        (location, frames)
    }
}

impl Default for TraceStack {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static ACTIVE_TRACE_STACK: TraceStack = TraceStack::new();
}

pub(crate) fn with_trace_stack<R>(f: impl FnOnce(&TraceStack) -> R) -> R {
    ACTIVE_TRACE_STACK.with(f)
}

/// Pushes `frame` onto the process-wide trace stack. Mutator code calls this
/// at function entry, before any potentially-failing operation in the
/// function body can be reached.
pub fn trace_push(frame: *mut TraceFrame) {
    with_trace_stack(|stack| stack.push(frame));
}

/// Pops the top frame off the process-wide trace stack, called at function
/// exit. Unlike the shadow stack's `pop`, an empty trace stack is not an
/// error here — the trace stack is diagnostic, not a correctness-bearing
/// rooting structure.
pub fn trace_pop() {
    with_trace_stack(|stack| stack.pop());
}

/// Updates the source location recorded on the top trace frame, called
/// before each potentially-failing operation so a subsequent panic can
/// report where it happened. No-op if no frame is currently pushed.
pub fn trace_set_location(line: u32, column: u32) {
    with_trace_stack(|stack| {
        let top = stack.top();
        if !top.is_null() {
            unsafe { (*top).set_location(line, column) };
        }
    });
}

fn dispatch(kind: PanicKind) -> ! {
    let (location, trace) = with_trace_stack(|stack| stack.snapshot());
    let panic = RuntimePanic::new(kind, location, trace);
    print_and_abort(&panic);
}

fn print_and_abort(panic: &RuntimePanic) -> ! {
    eprintln!("panic: {}", panic.kind);
    if let Some(loc) = &panic.location {
        eprintln!("location: {}:{}", loc.line, loc.column);
    }
    for frame in &panic.trace {
        eprintln!("  at {} ({}:{}:{})", frame.function_name, frame.file_path, frame.line, frame.column);
    }
    #[cfg(feature = "backtrace")]
    eprintln!("{:?}", backtrace::Backtrace::new());

    abort_or_unwind(panic.clone())
}

#[cfg(not(test))]
fn abort_or_unwind(_panic: RuntimePanic) -> ! {
    std::process::abort()
}

/// Test builds unwind instead of calling `abort()`, so `#[should_panic]`
/// and `catch_unwind` can observe the failure. Production builds always
/// abort, matching the original runtime's unconditional `abort()` and this
/// crate's `panic = "abort"` release profile.
#[cfg(test)]
fn abort_or_unwind(panic: RuntimePanic) -> ! {
    // Panic with the formatted message (rather than `panic_any(panic)`) so
    // `#[should_panic(expected = "...")]` can match on it directly; the
    // typed `RuntimePanic` is still what gets built and printed above.
    std::panic::panic_any(format!("{}", panic.kind))
}

pub fn panic_generic(message: String) -> ! {
    dispatch(PanicKind::Generic(message))
}

pub fn panic_null_deref() -> ! {
    dispatch(PanicKind::NullDeref)
}

pub fn panic_bad_cast(from: &'static str, to: &'static str) -> ! {
    dispatch(PanicKind::BadCast { from, to })
}

pub fn panic_oom() -> ! {
    dispatch(PanicKind::Oom)
}

/// Panics with the message held in a U8 array's bytes, up to the first NUL
/// byte (or the array's full length if none is found). Mirrors
/// `rt_panic_null_term_array`: null-object and null-data-pointer are their
/// own distinct generic panics before the message is ever read.
pub fn panic_null_term_array(array_obj: *mut ObjectHeader) -> ! {
    if array_obj.is_null() {
        panic_generic("rt_panic_null_term_array: object is null".to_string());
    }
    let data = crate::array::array_u8_data_ptr(array_obj);
    if data.is_null() {
        panic_generic("rt_panic_null_term_array: array data pointer is null".to_string());
    }
    let len = crate::array::array_len(array_obj) as usize;
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
    let message = String::from_utf8_lossy(&bytes[..end]).into_owned();
    dispatch(PanicKind::NullTerminatedArrayMessage(message))
}
