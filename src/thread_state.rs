//! Process-wide (single mutator) runtime state: the tracked-object registry,
//! the root sources, and the GC bookkeeping counters.
//!
//! `Starlight-JS-comet` models "one heap per mutator thread" with a
//! `MutatorRef` pinned behind `Arc`/safepoint machinery for its
//! generational, optionally concurrent collector. This runtime has exactly
//! one cooperative mutator and no concurrency to coordinate, so the
//! equivalent is a single `thread_local!` instance rather than a registry
//! of mutator threads — close to how `runtime.c`'s `g_thread_state` static
//! singleton works, but stored behind `thread_local!` so repeated
//! `init`/`shutdown` across `#[test]` functions in one binary do not
//! require `unsafe` global mutation.

use std::cell::RefCell;
use std::ptr;

use crate::config::GcConfig;
use crate::global_roots::GlobalRootRegistry;
use crate::header::ObjectHeader;
use crate::shadow_stack::ShadowStack;

pub(crate) struct TrackedNode {
    pub(crate) obj: *mut ObjectHeader,
    pub(crate) next: *mut TrackedNode,
}

/// Point-in-time GC statistics, the read-only observation surface named in
/// the external interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct GcStats {
    pub allocated_bytes: u64,
    pub live_bytes: u64,
    pub next_gc_threshold: u64,
    pub tracked_object_count: u64,
}

pub(crate) struct GcCounters {
    pub(crate) allocated_bytes: u64,
    pub(crate) live_bytes: u64,
    pub(crate) next_gc_threshold: u64,
    pub(crate) tracked_object_count: u64,
}

pub struct ThreadState {
    pub(crate) shadow_stack: ShadowStack,
    pub(crate) global_roots: RefCell<GlobalRootRegistry>,
    pub(crate) tracked_head: std::cell::Cell<*mut TrackedNode>,
    pub(crate) counters: RefCell<GcCounters>,
    pub(crate) config: GcConfig,
}

impl ThreadState {
    fn new(config: GcConfig) -> Self {
        let next_gc_threshold = config.min_threshold_bytes;
        ThreadState {
            shadow_stack: ShadowStack::new(),
            global_roots: RefCell::new(GlobalRootRegistry::new()),
            tracked_head: std::cell::Cell::new(ptr::null_mut()),
            counters: RefCell::new(GcCounters {
                allocated_bytes: 0,
                live_bytes: 0,
                next_gc_threshold,
                tracked_object_count: 0,
            }),
            config,
        }
    }

    pub fn shadow_stack(&self) -> &ShadowStack {
        &self.shadow_stack
    }

    pub fn get_stats(&self) -> GcStats {
        let c = self.counters.borrow();
        GcStats {
            allocated_bytes: c.allocated_bytes,
            live_bytes: c.live_bytes,
            next_gc_threshold: c.next_gc_threshold,
            tracked_object_count: c.tracked_object_count,
        }
    }
}

thread_local! {
    static THREAD_STATE: RefCell<Option<ThreadState>> = RefCell::new(None);
}

/// Initializes the process-wide thread state with default tunables.
/// Calling this again after `shutdown` (or in a fresh test) starts clean.
pub fn init() {
    init_with_config(GcConfig::default());
}

/// Initializes the thread state with a caller-supplied configuration.
/// Intended for embedders and tests that want non-default thresholds.
pub fn init_with_config(config: GcConfig) {
    THREAD_STATE.with(|cell| {
        *cell.borrow_mut() = Some(ThreadState::new(config));
    });
}

/// Tears down the thread state, freeing every tracked object and root
/// registry entry first (see [`crate::collector::reset_state`]).
pub fn shutdown() {
    THREAD_STATE.with(|cell| {
        if cell.borrow().is_some() {
            crate::collector::reset_state();
        }
        *cell.borrow_mut() = None;
    });
}

/// Runs `f` with the active thread state. Panics (generic) if `init` was
/// never called — there is no implicit lazy initialization, matching the
/// original runtime's explicit `rt_init`/`rt_thread_state` pair.
pub fn with_thread_state<R>(f: impl FnOnce(&ThreadState) -> R) -> R {
    THREAD_STATE.with(|cell| {
        let state = cell.borrow();
        match state.as_ref() {
            Some(ts) => f(ts),
            None => crate::trace::panic_generic("thread state not initialized".to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_shutdown_round_trip() {
        init();
        let stats = with_thread_state(|ts| ts.get_stats());
        assert_eq!(stats.tracked_object_count, 0);
        shutdown();
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn using_state_before_init_panics() {
        shutdown();
        with_thread_state(|ts| ts.get_stats());
    }
}
