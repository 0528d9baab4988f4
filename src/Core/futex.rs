// Blocking wait/wake on a 32-bit signal word.
// Used by the ring buffer (consumer side) and the deferred work slot.

use std::sync::atomic::AtomicU32;

/// Block the calling thread while `*atomic == expected`.
///
/// Returns immediately if the word already moved on. Callers must re-check
/// their condition after waking: a return does not mean the word changed.
#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    if atomic.load(Ordering::Acquire) != expected {
        return;
    }

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake up to `waiters` threads blocked on `atomic`.
#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32, waiters: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            waiters,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
    use std::sync::atomic::Ordering;

    // No futex: spin politely until the word moves.
    while atomic.load(Ordering::Acquire) == expected {
        std::thread::yield_now();
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32, _waiters: i32) {}
