//! Time sources.
//!
//! Hover delays and snap animations read [`Clock::now`]; persisted records are
//! stamped with [`Clock::unix_millis`]. Tests drive a [`ManualClock`].

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn unix_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct ManualState {
    base: Instant,
    elapsed: Duration,
    wall_base_ms: u64,
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<ManualState>>);

impl ManualClock {
    pub fn new(wall_base_ms: u64) -> Self {
        Self(Arc::new(Mutex::new(ManualState {
            base: Instant::now(),
            elapsed: Duration::ZERO,
            wall_base_ms,
        })))
    }

    pub fn advance(&self, by: Duration) {
        self.0.lock().elapsed += by;
    }

    pub fn advance_ms(&self, ms: u64) { self.advance(Duration::from_millis(ms)) }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new(1_700_000_000_000) }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.0.lock();
        state.base + state.elapsed
    }

    fn unix_millis(&self) -> u64 {
        let state = self.0.lock();
        state.wall_base_ms + state.elapsed.as_millis() as u64
    }
}
