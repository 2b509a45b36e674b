// Observable stores
//
// Values in the fixture are only ever read by an out-of-process debugger, so
// the optimizer is free to prove them dead. Everything meant to be inspected
// passes through one of these helpers, which either go through a volatile
// load or hand the address to `black_box`.

use std::hint::black_box;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reads `value` through a volatile load and returns the copy.
///
/// Forces `value` to be materialized in memory at the point of the call.
#[inline(never)]
pub fn pin<T: Copy>(value: &T) -> T {
    // SAFETY: `value` is a valid, aligned reference for the duration of the read.
    let copy = unsafe { ptr::read_volatile(value) };
    black_box(copy)
}

/// Lets the address of `value` escape so it is kept in addressable memory.
#[inline(never)]
pub fn keep<T: ?Sized>(value: &T) -> &T {
    black_box(value)
}

/// Sets a process-wide flag so that the new value is visible in memory.
pub fn raise(flag: &AtomicBool, value: bool) {
    flag.store(value, Ordering::SeqCst);
    black_box(flag);
}
