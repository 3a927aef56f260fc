//! End-to-end scenarios over the public symbol surface. Each test resets
//! collector state first via `reset_state` for isolation, giving every test
//! a fresh collector the way a fresh `MiniMarkGC::new()` would in
//! `Starlight-JS-comet`'s own test suite.

use niflheim_rt::array::{array_ref_get, array_ref_new, array_ref_set, array_u8_get, array_u8_new, array_u8_set, array_u8_slice};
use niflheim_rt::boxed::{box_i64_get, box_i64_new};
use niflheim_rt::collector::{collect, reset_state};
use niflheim_rt::global_roots::GlobalRootRegistry;
use niflheim_rt::shadow_stack::RootFrame;
use niflheim_rt::strbuf::{strbuf_len, strbuf_new, strbuf_reserve, strbuf_to_str};
use niflheim_rt::string::str_len;
use niflheim_rt::thread_state::{init, with_thread_state};
use niflheim_rt::ObjectHeader;

fn fresh() {
    // `init` is idempotent to call repeatedly across tests in one binary
    // since each `#[test]` runs on its own OS thread with its own
    // thread-local state; `reset_state` additionally clears any leftover
    // objects within a single test.
    init();
    reset_state();
}

#[test]
fn s1_unrooted_allocations_are_fully_reclaimed() {
    fresh();
    with_thread_state(|ts| {
        for i in 0..200 {
            box_i64_new(ts, i);
        }
    });
    collect();
    with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
}

#[test]
fn s2_rooted_chain_survives_then_is_reclaimed_after_unrooting() {
    fresh();
    with_thread_state(|ts| {
        let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
        let mut frame = RootFrame::init(&mut slots);
        ts.shadow_stack().push(&mut frame as *mut _);

        let c = array_ref_new(ts, 1);
        let b = array_ref_new(ts, 1);
        let a = array_ref_new(ts, 1);
        array_ref_set(b, 0, c);
        array_ref_set(a, 0, b);
        frame.slot_store(0, a);

        collect();
        assert_eq!(ts.get_stats().tracked_object_count, 3);

        frame.slot_store(0, std::ptr::null_mut());
        ts.shadow_stack().pop();
    });
    collect();
    with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
}

#[test]
fn s3_reachable_cycle_survives_unreachable_cycle_is_collected() {
    fresh();
    with_thread_state(|ts| {
        let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
        let mut frame = RootFrame::init(&mut slots);
        ts.shadow_stack().push(&mut frame as *mut _);

        let n1 = array_ref_new(ts, 1);
        let n2 = array_ref_new(ts, 1);
        array_ref_set(n1, 0, n2);
        array_ref_set(n2, 0, n1);
        frame.slot_store(0, n1);

        collect();
        assert_eq!(ts.get_stats().tracked_object_count, 2);

        frame.slot_store(0, std::ptr::null_mut());
        ts.shadow_stack().pop();
    });
    collect();
    with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
}

#[test]
fn s4_array_slice_is_copy_not_view() {
    fresh();
    with_thread_state(|ts| {
        let arr = array_u8_new(ts, 4);
        array_u8_set(arr, 0, 9);
        array_u8_set(arr, 1, 7);
        let slice = array_u8_slice(ts, arr, 0, 2);
        array_u8_set(arr, 0, 1);
        assert_eq!(array_u8_get(slice, 0), 9);
        assert_eq!(array_u8_get(slice, 1), 7);
    });
}

#[test]
fn s5_reference_array_contents_collected_when_cleared_then_unrooted() {
    fresh();
    with_thread_state(|ts| {
        let mut slots = [std::ptr::null_mut::<ObjectHeader>(); 1];
        let mut frame = RootFrame::init(&mut slots);
        ts.shadow_stack().push(&mut frame as *mut _);

        let arr = array_ref_new(ts, 2);
        frame.slot_store(0, arr);
        let a = box_i64_new(ts, 1);
        let b = box_i64_new(ts, 2);
        array_ref_set(arr, 0, a);
        array_ref_set(arr, 1, b);

        collect();
        assert_eq!(ts.get_stats().tracked_object_count, 3);

        array_ref_set(arr, 0, std::ptr::null_mut());
        array_ref_set(arr, 1, std::ptr::null_mut());
        collect();
        assert_eq!(ts.get_stats().tracked_object_count, 1);

        frame.slot_store(0, std::ptr::null_mut());
        ts.shadow_stack().pop();
    });
    collect();
    with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
}

#[test]
fn s6_string_buffer_reserve_from_empty() {
    fresh();
    with_thread_state(|ts| {
        let buf = strbuf_new(ts, 0);
        strbuf_reserve(ts, buf, 16);
        assert_eq!(strbuf_len(buf), 0);
        let s = strbuf_to_str(ts, buf);
        assert_eq!(str_len(s), 0);
    });
}

#[test]
fn s7_allocation_pressure_triggers_collection_before_explicit_collect() {
    fresh();
    with_thread_state(|ts| {
        for i in 0..5000 {
            box_i64_new(ts, i);
        }
        // Threshold-driven collection must have fired at least once under
        // this much unrooted allocation pressure.
        assert!(ts.get_stats().tracked_object_count < 5000);
    });
    collect();
    with_thread_state(|ts| assert_eq!(ts.get_stats().tracked_object_count, 0));
}

#[test]
#[should_panic(expected = "shadow stack underflow")]
fn s8a_pop_roots_with_no_frame_panics() {
    fresh();
    with_thread_state(|ts| {
        ts.shadow_stack().pop();
    });
}

#[test]
#[should_panic(expected = "null slot")]
fn s8b_register_global_root_null_panics() {
    let mut registry = GlobalRootRegistry::new();
    registry.register(std::ptr::null_mut());
}
