//! Tick timing.
//!
//! Every tick is stamped with its start and end instants so that real-time
//! budget violations are observable. `TickStats` accumulates counters with
//! relaxed atomics only, so the real-time thread can record into it while any
//! other thread reads it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Start/end instants of one executed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStamp {
    pub tick: u64,
    pub started: Instant,
    pub finished: Instant,
}

impl TickStamp {
    pub fn duration(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    /// True if the tick took longer than `period`.
    pub fn overran(&self, period: Duration) -> bool {
        self.duration() > period
    }
}

/// A running timer for one tick.
#[derive(Debug)]
pub struct TickTimer {
    tick: u64,
    started: Instant,
}

impl TickTimer {
    pub fn start(tick: u64) -> Self {
        Self {
            tick,
            started: Instant::now(),
        }
    }

    pub fn stop(self) -> TickStamp {
        TickStamp {
            tick: self.tick,
            started: self.started,
            finished: Instant::now(),
        }
    }
}

/// Accumulated tick statistics.
#[derive(Debug, Default)]
pub struct TickStats {
    completed: AtomicU64,
    aborted: AtomicU64,
    overruns: AtomicU64,
    total_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl TickStats {
    pub const fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
            max_ns: AtomicU64::new(0),
        }
    }

    /// Record the duration of a tick, successful or not.
    pub fn record(&self, stamp: &TickStamp, completed: bool) {
        let nanos = u64::try_from(stamp.duration().as_nanos()).unwrap_or(u64::MAX);
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.max_ns.fetch_max(nanos, Ordering::Relaxed);
        if completed {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of ticks whose outputs were published.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Number of ticks discarded because a system failed.
    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Total number of ticks executed.
    pub fn count(&self) -> u64 {
        self.completed() + self.aborted()
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_nanos(self.max_ns.load(Ordering::Relaxed))
    }

    pub fn mean_duration(&self) -> Duration {
        let count = self.count();
        if count > 0 {
            Duration::from_nanos(self.total_ns.load(Ordering::Relaxed) / count)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(tick: u64, micros: u64) -> TickStamp {
        let started = Instant::now();
        TickStamp {
            tick,
            started,
            finished: started + Duration::from_micros(micros),
        }
    }

    #[test]
    fn stamp_detects_overrun() {
        let s = stamp(1, 2_500);
        assert_eq!(s.duration(), Duration::from_micros(2_500));
        assert!(s.overran(Duration::from_millis(2)));
        assert!(!s.overran(Duration::from_millis(3)));
    }

    #[test]
    fn stats_accumulate() {
        let stats = TickStats::new();
        stats.record(&stamp(1, 100), true);
        stats.record(&stamp(2, 300), false);
        stats.record_overrun();

        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.aborted(), 1);
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.overruns(), 1);
        assert_eq!(stats.max_duration(), Duration::from_micros(300));
        assert_eq!(stats.mean_duration(), Duration::from_micros(200));
    }

    #[test]
    fn timer_produces_ordered_stamp() {
        let timer = TickTimer::start(7);
        let s = timer.stop();
        assert_eq!(s.tick, 7);
        assert!(s.finished >= s.started);
    }
}
