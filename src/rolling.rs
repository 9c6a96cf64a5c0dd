//! # Rolling Window
//! Bounded, time-ordered window of battery samples (default 30 min / 360 samples).
//!
//! Samples are kept oldest-first and never mutated once inserted. Anything older
//! than the window, or beyond the capacity, is dropped from the front. The
//! window is not synchronised itself; the session store owns the lock.

use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, time::Duration};

/// One live battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatterySample {
    /// Epoch milliseconds.
    pub ts: i64,
    /// Battery level, 0–100.
    pub pct: f64,
    #[serde(default)]
    pub charging: bool,
}

impl BatterySample {
    pub fn new(ts: i64, pct: f64, charging: bool) -> Self {
        Self { ts, pct, charging }
    }

    pub fn is_valid_level(&self) -> bool {
        self.pct.is_finite() && (0.0..=100.0).contains(&self.pct)
    }
}

#[derive(Debug, Clone)]
pub struct SampleWindow {
    buf: VecDeque<BatterySample>,
    window: Duration,
    capacity: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new_30m()
    }
}

impl SampleWindow {
    pub fn with_window(window: Duration, capacity: usize) -> Self {
        Self {
            buf: VecDeque::new(),
            window,
            capacity: capacity.max(1),
        }
    }

    /// 30 minutes, one sample per 5 s at most.
    pub fn new_30m() -> Self {
        Self::with_window(Duration::from_secs(30 * 60), 360)
    }

    /// Insert a sample at its time position, then prune relative to `now_ms`.
    ///
    /// Returns `false` (and stores nothing) for a level outside 0–100.
    pub fn record(&mut self, sample: BatterySample, now_ms: i64) -> bool {
        if !sample.is_valid_level() {
            return false;
        }
        match self.buf.back() {
            Some(last) if sample.ts < last.ts => {
                let at = self.buf.partition_point(|s| s.ts <= sample.ts);
                self.buf.insert(at, sample);
            }
            _ => self.buf.push_back(sample),
        }
        self.prune(now_ms);
        true
    }

    /// Drop samples older than the window and any overflow. Returns how many went.
    pub fn prune(&mut self, now_ms: i64) -> usize {
        let before = self.buf.len();
        let cutoff = now_ms.saturating_sub(self.window_ms());
        while let Some(first) = self.buf.front() {
            if first.ts < cutoff {
                self.buf.pop_front();
            } else {
                break;
            }
        }
        while self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
        before - self.buf.len()
    }

    pub fn latest(&self) -> Option<&BatterySample> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatterySample> {
        self.buf.iter()
    }

    pub fn to_vec(&self) -> Vec<BatterySample> {
        self.buf.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Length of the window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;

    #[test]
    fn out_of_order_samples_are_placed_by_time() {
        let mut w = SampleWindow::new_30m();
        let now = 100 * MIN;
        assert!(w.record(BatterySample::new(now - 2 * MIN, 80.0, false), now));
        assert!(w.record(BatterySample::new(now, 78.0, false), now));
        assert!(w.record(BatterySample::new(now - MIN, 79.0, false), now));
        let ts: Vec<i64> = w.iter().map(|s| s.ts).collect();
        assert_eq!(ts, vec![now - 2 * MIN, now - MIN, now]);
    }

    #[test]
    fn prunes_by_age_and_capacity() {
        let mut w = SampleWindow::with_window(Duration::from_secs(10 * 60), 3);
        let now = 100 * MIN;
        w.record(BatterySample::new(now - 20 * MIN, 90.0, false), now);
        assert!(w.is_empty());
        for i in 0..5 {
            w.record(BatterySample::new(now - 5 * MIN + i * MIN, 80.0 - i as f64, false), now);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.latest().map(|s| s.pct), Some(76.0));
        assert_eq!(w.prune(now + 30 * MIN), 3);
    }

    #[test]
    fn rejects_impossible_levels() {
        let mut w = SampleWindow::new_30m();
        assert!(!w.record(BatterySample::new(0, 140.0, false), 0));
        assert!(!w.record(BatterySample::new(0, f64::NAN, false), 0));
        assert!(w.is_empty());
    }
}
