//! Managed-memory runtime for emitted code: a precise, cooperative
//! mark-and-sweep collector, its shadow-stack/global-root rooting
//! discipline, and the managed container primitives (boxes, typed arrays,
//! strings, string buffers, reference vectors) built on top of it.
//!
//! There is exactly one mutator thread and no write barrier: see
//! [`thread_state`] for the lifecycle (`init`/`shutdown`) and [`collector`]
//! for the collection algorithm itself.

pub mod allocator;
pub mod array;
pub mod boxed;
pub mod collector;
pub mod config;
pub mod error;
pub mod global_roots;
pub mod header;
pub mod io;
pub mod shadow_stack;
pub mod string;
pub mod strbuf;
pub mod thread_state;
pub mod trace;
pub mod type_desc;
pub mod vector;

pub use config::GcConfig;
pub use error::{PanicKind, RuntimePanic, SourceLocation, TraceFrameSnapshot};
pub use header::ObjectHeader;
pub use thread_state::{init, init_with_config, shutdown, with_thread_state, GcStats, ThreadState};
pub use type_desc::checked_cast;
