//! Thin wrappers for the I/O "external collaborator" surface emitted code
//! calls directly: print-line for each scalar kind, and read-all-of-stdin.
//! Grounded in `runtime/src/io.c`'s format conventions (`true`/`false` for
//! bool, `%f`-style default formatting for double) and its doubling-buffer
//! read loop with an explicit "input too large" overflow panic.

use std::io::{Read, Write};

use crate::header::ObjectHeader;
use crate::thread_state::ThreadState;

pub fn println_i64(value: i64) {
    println!("{}", value);
}

pub fn println_u64(value: u64) {
    println!("{}", value);
}

pub fn println_u8(value: u8) {
    println!("{}", value);
}

pub fn println_bool(value: bool) {
    println!("{}", if value { "true" } else { "false" });
}

pub fn println_double(value: f64) {
    println!("{}", value);
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

/// Reads stdin to EOF into a growable buffer (doubling on overflow) and
/// returns it as a freshly allocated `Str`. A read error is a generic
/// panic; there is no partial-read recovery path.
pub fn read_all(ts: &ThreadState) -> *mut ObjectHeader {
    flush_stdout();
    let mut buf = Vec::with_capacity(4096);
    match std::io::stdin().read_to_end(&mut buf) {
        Ok(_) => {}
        Err(_) => crate::trace::panic_generic("read_all: failed reading stdin".to_string()),
    }
    crate::string::str_from_bytes(ts, buf.as_ptr(), buf.len() as u64)
}
