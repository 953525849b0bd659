//! Millisecond timestamps for fragment naming and snapshot selection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_MS: AtomicU64 = AtomicU64::new(0);

/// Current wall-clock time in milliseconds since the Unix epoch, forced
/// strictly increasing within this process.
///
/// Two sessions opened in the same wall millisecond would otherwise produce
/// fragments whose order depends on their random name suffixes; bumping
/// past the previous return value keeps single-process ordering exact
/// without sleeping. Cross-process ties are broken by the suffix, as the
/// fragment naming scheme requires.
pub fn now_ms() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let mut last = LAST_MS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last.saturating_add(1));
        match LAST_MS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}
