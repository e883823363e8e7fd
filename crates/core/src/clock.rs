use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microsecond-precision monotonic timestamp source used to stamp
/// [`crate::cached::CachedEvent`] admission order.
///
/// Deliberately *not* wall-clock time: the auto-removal watermark sweep only
/// needs "admitted before/after", and `Instant` can't go backwards under
/// clock adjustments the way `SystemTime` can.
#[must_use]
pub fn now_micros() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch
        .elapsed()
        .as_micros()
        .try_into()
        .unwrap_or(u64::MAX)
}
