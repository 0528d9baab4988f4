// Monotonic "uptime" clock. Boot is the first time anything asks for it.

use lazy_static::lazy_static;
use std::time::Instant;

lazy_static! {
    static ref BOOT: Instant = Instant::now();
}

/// Pin the boot instant. Call early so uptime reads close to process age.
pub fn init() {
    lazy_static::initialize(&BOOT);
}

/// Milliseconds elapsed since boot. Never decreases.
pub fn uptime_ms() -> i64 {
    BOOT.elapsed().as_millis() as i64
}
