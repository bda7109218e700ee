//! Process-wide external memory pressure gauge.
//!
//! Memory handed out by the native allocators and by imported allocation owners
//! lives outside of the Rust global allocator's bookkeeping as far as consumers
//! are concerned. The gauge lets hosts observe how much of it is currently alive.

use std::sync::atomic::{AtomicU64, Ordering};

static PRESSURE: AtomicU64 = AtomicU64::new(0);

/// Records `bytes` of newly attached native memory.
#[inline]
pub fn add(bytes: u64) {
    PRESSURE.fetch_add(bytes, Ordering::Relaxed);
}

/// Removes `bytes` previously recorded with [`add`].
///
/// The gauge saturates at zero.
#[inline]
pub fn remove(bytes: u64) {
    let _ = PRESSURE.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(bytes))
    });
}

/// Current amount of native memory reported to the gauge, in bytes.
///
/// **Note**: diagnostic only, the value may be outdated in a concurrent environment.
pub fn current() -> u64 {
    PRESSURE.load(Ordering::Relaxed)
}
