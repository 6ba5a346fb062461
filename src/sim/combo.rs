//! Killing-spree detection
//!
//! A ring buffer holds the timestamps of the last `N` block kills. When the
//! newest and the oldest of them are less than the spree interval apart, the
//! spree fires and the buffer is refilled with sentinels so overlapping
//! windows can't fire again right away.

/// Timestamp that is always too old to complete a spree
const SENTINEL: f64 = f64::NEG_INFINITY;

#[derive(Debug, Clone)]
pub struct ComboTracker {
    kills: Vec<f64>,
    cursor: usize,
    /// Seconds
    interval: f64,
}

impl ComboTracker {
    /// Tracker for `kills_per_spree` kills within `interval` seconds.
    /// Fewer than two kills per spree is treated as two.
    pub fn new(kills_per_spree: usize, interval: f64) -> Self {
        Self {
            kills: vec![SENTINEL; kills_per_spree.max(2)],
            cursor: 0,
            interval,
        }
    }

    pub fn kills_per_spree(&self) -> usize {
        self.kills.len()
    }

    /// Record a kill at `timestamp` (seconds). Returns true when it
    /// completes a spree.
    pub fn record_kill(&mut self, timestamp: f64) -> bool {
        self.kills[self.cursor] = timestamp;
        self.cursor = (self.cursor + 1) % self.kills.len();
        let oldest = self.kills[self.cursor];
        if timestamp - oldest < self.interval {
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.kills.fill(SENTINEL);
        self.cursor = 0;
    }
}
