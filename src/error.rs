//! Fatal-failure surface.
//!
//! Every condition here is unrecoverable by design (see the panic
//! integration in [`crate::trace`]): there is no `Result`-returning API in
//! this crate's public surface. The error types exist so the failure can be
//! represented as data — matched, displayed, asserted on in tests — rather
//! than formatted ad hoc at each call site.

use thiserror::Error;

/// The distinguishable fatal-failure kinds the runtime can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PanicKind {
    #[error("{0}")]
    Generic(String),

    #[error("null dereference")]
    NullDeref,

    #[error("bad cast ({from} -> {to})")]
    BadCast { from: &'static str, to: &'static str },

    #[error("out of memory")]
    Oom,

    #[error("{0}")]
    NullTerminatedArrayMessage(String),
}

/// A fatal failure, carrying the active source location (if any trace frame
/// was pushed) and a snapshot of the trace stack at the moment of failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct RuntimePanic {
    pub kind: PanicKind,
    pub location: Option<SourceLocation>,
    pub trace: Vec<TraceFrameSnapshot>,
}

/// A single `{file, line, column}` triple captured from the active trace
/// frame when a panic fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// A snapshot of one frame of the trace stack, taken at panic time so the
/// dump does not race with frames being popped during unwind/abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrameSnapshot {
    pub function_name: &'static str,
    pub file_path: &'static str,
    pub line: u32,
    pub column: u32,
}

impl RuntimePanic {
    pub fn new(kind: PanicKind, location: Option<SourceLocation>, trace: Vec<TraceFrameSnapshot>) -> Self {
        RuntimePanic { kind, location, trace }
    }
}
