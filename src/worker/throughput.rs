//! Packet and byte accounting for the analyzer loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Packet and bit rates over some span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub mpps: f64,
    pub gbps: f64,
}

impl Rate {
    pub fn over(packets: u64, bytes: u64, secs: f64) -> Self {
        if secs <= 0.0 {
            return Self::default();
        }
        Self {
            mpps: packets as f64 / secs / 1e6,
            gbps: bytes as f64 * 8.0 / secs / 1e9,
        }
    }
}

/// Per-interval counters rolled into lifetime totals.
#[derive(Debug)]
pub struct Throughput {
    interval_packets: u64,
    interval_bytes: u64,
    total_packets: u64,
    total_bytes: u64,
    interval_start: Instant,
    analysis_start: Instant,
    started_at: DateTime<Utc>,
}

impl Throughput {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            interval_packets: 0,
            interval_bytes: 0,
            total_packets: 0,
            total_bytes: 0,
            interval_start: now,
            analysis_start: now,
            started_at: Utc::now(),
        }
    }

    pub fn add_packets(&mut self, n: usize) {
        self.interval_packets += n as u64;
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.interval_bytes += n;
    }

    pub fn interval_elapsed(&self) -> Duration {
        self.interval_start.elapsed()
    }

    /// Close the current interval. Counters fold into totals only when `fold` is set.
    pub fn roll(&mut self, fold: bool) -> Rate {
        let secs = self.interval_elapsed().as_secs_f64();
        let rate = Rate::over(self.interval_packets, self.interval_bytes, secs);
        if fold {
            self.total_packets += self.interval_packets;
            self.total_bytes += self.interval_bytes;
        }
        self.interval_packets = 0;
        self.interval_bytes = 0;
        self.interval_start = Instant::now();
        rate
    }

    /// Training traffic is not counted; analysis time restarts at EXECUTE.
    pub fn restart_analysis(&mut self) {
        self.interval_packets = 0;
        self.interval_bytes = 0;
        self.analysis_start = Instant::now();
        self.started_at = Utc::now();
    }

    /// Fold what is left and return `(packets, bytes, seconds since analysis start)`.
    pub fn finish(&mut self) -> (u64, u64, f64) {
        self.total_packets += self.interval_packets;
        self.total_bytes += self.interval_bytes;
        self.interval_packets = 0;
        self.interval_bytes = 0;
        (
            self.total_packets,
            self.total_bytes,
            self.analysis_start.elapsed().as_secs_f64(),
        )
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn interval_packets(&self) -> u64 {
        self.interval_packets
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_scales_to_mpps_and_gbps() {
        let r = Rate::over(2_000_000, 250_000_000, 2.0);
        assert_eq!(r.mpps, 1.0);
        assert_eq!(r.gbps, 1.0);
        assert_eq!(Rate::over(10, 10, 0.0), Rate::default());
    }

    #[test]
    fn roll_folds_only_when_asked() {
        let mut t = Throughput::new();
        t.add_packets(10);
        t.add_bytes(600);
        t.roll(false);
        assert_eq!(t.total_packets(), 0);
        t.add_packets(5);
        t.roll(true);
        assert_eq!(t.total_packets(), 5);
        t.add_packets(3);
        let (packets, _, _) = t.finish();
        assert_eq!(packets, 8);
    }
}
