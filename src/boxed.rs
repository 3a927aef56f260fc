//! Boxed scalar primitives: five LEAF, fixed-size wrappers around a single
//! value. Grounded in `runtime/src/box.c`, including its static descriptors'
//! `type_id` values and its widen/normalize-on-store conventions (u8 widened
//! to 64 bits, bool normalized to 0/1 in a 64-bit slot).

use crate::header::ObjectHeader;
use crate::thread_state::ThreadState;
use crate::type_desc::{checked_cast, TypeDescriptor, FLAG_LEAF};

macro_rules! box_kind {
    ($desc:ident, $type_id:expr, $debug_name:expr) => {
        static $desc: TypeDescriptor = TypeDescriptor {
            type_id: $type_id,
            flags: FLAG_LEAF,
            abi_version: 1,
            align_bytes: 8,
            fixed_size_bytes: 8,
            debug_name: $debug_name,
            trace_fn: None,
            pointer_offsets: &[],
        };
    };
}

box_kind!(TYPE_BOX_I64, 0x4249_5831, "BoxI64");
box_kind!(TYPE_BOX_U64, 0x4255_5831, "BoxU64");
box_kind!(TYPE_BOX_U8, 0x4255_3831, "BoxU8");
box_kind!(TYPE_BOX_BOOL, 0x4242_4F31, "BoxBool");
box_kind!(TYPE_BOX_DOUBLE, 0x4244_5831, "BoxDouble");

fn require(obj: *mut ObjectHeader, expected: &'static TypeDescriptor) {
    checked_cast(obj, expected);
}

macro_rules! scalar_box {
    ($new_fn:ident, $get_fn:ident, $desc:expr, $value_ty:ty, $store:expr, $load:expr) => {
        pub fn $new_fn(ts: &ThreadState, value: $value_ty) -> *mut ObjectHeader {
            let obj = ts.alloc_obj(&$desc, 8);
            let slot = unsafe { (*obj).payload_ptr() as *mut u64 };
            unsafe { *slot = $store(value) };
            obj
        }

        pub fn $get_fn(obj: *mut ObjectHeader) -> $value_ty {
            require(obj, &$desc);
            let slot = unsafe { (*obj).payload_ptr() as *const u64 };
            $load(unsafe { *slot })
        }
    };
}

scalar_box!(box_i64_new, box_i64_get, TYPE_BOX_I64, i64, |v: i64| v as u64, |raw: u64| raw as i64);
scalar_box!(box_u64_new, box_u64_get, TYPE_BOX_U64, u64, |v: u64| v, |raw: u64| raw);
scalar_box!(box_u8_new, box_u8_get, TYPE_BOX_U8, u8, |v: u8| v as u64, |raw: u64| raw as u8);
scalar_box!(box_bool_new, box_bool_get, TYPE_BOX_BOOL, bool, |v: bool| if v { 1u64 } else { 0u64 }, |raw: u64| raw != 0);
scalar_box!(
    box_double_new,
    box_double_get,
    TYPE_BOX_DOUBLE,
    f64,
    |v: f64| v.to_bits(),
    |raw: u64| f64::from_bits(raw)
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_state::{init, shutdown, with_thread_state};

    #[test]
    fn round_trips_every_scalar_kind() {
        init();
        with_thread_state(|ts| {
            assert_eq!(box_i64_get(box_i64_new(ts, -7)), -7);
            assert_eq!(box_u64_get(box_u64_new(ts, 9)), 9);
            assert_eq!(box_u8_get(box_u8_new(ts, 250)), 250);
            assert_eq!(box_bool_get(box_bool_new(ts, true)), true);
            assert_eq!(box_bool_get(box_bool_new(ts, false)), false);
            assert_eq!(box_double_get(box_double_new(ts, 3.5)), 3.5);
        });
        shutdown();
    }

    #[test]
    #[should_panic(expected = "bad cast")]
    fn get_with_wrong_kind_panics() {
        init();
        with_thread_state(|ts| {
            let b = box_i64_new(ts, 1);
            box_u64_get(b);
        });
        shutdown();
    }
}
