//! Hall-edge speed estimation.
//!
//! The [`EdgeCounter`] is the only state shared with interrupt context. The hall
//! interrupt calls [`EdgeCounter::record_edge`] on every transition of any of the
//! three hall lines; the main context polls a [`SpeedSampler`] at its own cadence.
//!
//! ```rust,no_run
//! use drv8353_dd::rpm::{EdgeCounter, SpeedSampler};
//!
//! static HALL_EDGES: EdgeCounter = EdgeCounter::new();
//!
//! fn on_hall_interrupt() {
//!     HALL_EDGES.record_edge();
//! }
//!
//! # fn millis() -> u32 { 0 }
//! let mut sampler = SpeedSampler::new(&HALL_EDGES);
//! let rpm = sampler.sample(millis());
//! ```

use portable_atomic::{AtomicU32, Ordering};

/// Electrical states per pole pair for three hall sensors.
pub const ELECTRICAL_STATES_PER_POLE_PAIR: u32 = 6;
/// 8-pole motor.
pub const DEFAULT_POLE_PAIRS: u32 = 4;
/// With no edges over a window longer than this the speed is reported as 0.
pub const STALE_WINDOW_MS: u32 = 500;

const MS_PER_MINUTE: f32 = 60_000.0;

/// Count of hall electrical-state transitions. Wraps at `u32::MAX`.
pub struct EdgeCounter {
    edges: AtomicU32,
}

impl EdgeCounter {
    pub const fn new() -> Self {
        Self {
            edges: AtomicU32::new(0),
        }
    }

    /// Interrupt-side increment. Single atomic RMW; never blocks.
    #[inline]
    pub fn record_edge(&self) {
        self.edges.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.edges.load(Ordering::Acquire)
    }
}

impl Default for EdgeCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct History {
    timestamp_ms: u32,
    edges: u32,
}

/// Polled RPM estimator over an [`EdgeCounter`].
pub struct SpeedSampler<'a> {
    counter: &'a EdgeCounter,
    edges_per_rev: f32,
    history: Option<History>,
}

impl<'a> SpeedSampler<'a> {
    pub fn new(counter: &'a EdgeCounter) -> Self {
        Self::with_pole_pairs(counter, DEFAULT_POLE_PAIRS)
    }

    pub fn with_pole_pairs(counter: &'a EdgeCounter, pole_pairs: u32) -> Self {
        let edges_per_rev = pole_pairs
            .max(1)
            .saturating_mul(ELECTRICAL_STATES_PER_POLE_PAIR);
        Self {
            counter,
            edges_per_rev: edges_per_rev as f32,
            history: None,
        }
    }

    /// Hall edges per mechanical revolution.
    pub fn edges_per_revolution(&self) -> f32 {
        self.edges_per_rev
    }

    /// Mechanical RPM since the previous call.
    ///
    /// Returns 0 on the first call, after a timestamp rollover (history is resynced),
    /// when no time has elapsed, and when no edges arrived over more than
    /// [`STALE_WINDOW_MS`].
    pub fn sample(&mut self, now_ms: u32) -> f32 {
        let edges_now = self.counter.count();

        let Some(last) = self.history else {
            self.history = Some(History {
                timestamp_ms: now_ms,
                edges: edges_now,
            });
            return 0.0;
        };

        if now_ms < last.timestamp_ms {
            trace!("hall sampler: timestamp rollover, resyncing");
            self.history = Some(History {
                timestamp_ms: now_ms,
                edges: edges_now,
            });
            return 0.0;
        }

        let elapsed_ms = now_ms - last.timestamp_ms;
        if elapsed_ms == 0 {
            return 0.0;
        }

        let delta_edges = edges_now.wrapping_sub(last.edges);
        self.history = Some(History {
            timestamp_ms: now_ms,
            edges: edges_now,
        });

        if delta_edges == 0 && elapsed_ms > STALE_WINDOW_MS {
            return 0.0;
        }

        (delta_edges as f32 / elapsed_ms as f32) * MS_PER_MINUTE / self.edges_per_rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn edges(counter: &EdgeCounter, n: u32) {
        for _ in 0..n {
            counter.record_edge();
        }
    }

    #[test]
    fn first_sample_primes_and_reports_zero() {
        let counter = EdgeCounter::new();
        edges(&counter, 1000);
        let mut sampler = SpeedSampler::new(&counter);
        assert_eq!(sampler.sample(5_000), 0.0);
    }

    #[test]
    fn one_revolution_per_second_is_sixty_rpm() {
        let counter = EdgeCounter::new();
        let mut sampler = SpeedSampler::new(&counter);
        assert_eq!(sampler.edges_per_revolution(), 24.0);
        sampler.sample(1_000);
        edges(&counter, 24);
        assert!(approx(sampler.sample(2_000), 60.0));
    }

    #[test]
    fn zero_elapsed_reports_zero_and_keeps_history() {
        let counter = EdgeCounter::new();
        let mut sampler = SpeedSampler::new(&counter);
        sampler.sample(100);
        edges(&counter, 12);
        assert_eq!(sampler.sample(100), 0.0);
        // The 12 edges are still attributed to the window starting at 100 ms.
        assert!(approx(sampler.sample(600), 60.0));
    }

    #[test]
    fn rollover_resyncs_without_spike() {
        let counter = EdgeCounter::new();
        let mut sampler = SpeedSampler::new(&counter);
        sampler.sample(u32::MAX - 10);
        edges(&counter, 500);
        assert_eq!(sampler.sample(40), 0.0);

        edges(&counter, 24);
        // Only the 24 edges after the resync count.
        assert!(approx(sampler.sample(1_040), 60.0));
    }

    #[test]
    fn stale_window_forces_zero() {
        let counter = EdgeCounter::new();
        let mut sampler = SpeedSampler::new(&counter);
        sampler.sample(0);
        edges(&counter, 12);
        assert!(approx(sampler.sample(100), 300.0));
        assert_eq!(sampler.sample(700), 0.0);
    }

    #[test]
    fn edge_counter_wraps() {
        let counter = EdgeCounter {
            edges: AtomicU32::new(u32::MAX - 5),
        };
        let mut sampler = SpeedSampler::new(&counter);
        sampler.sample(0);
        edges(&counter, 24);
        assert_eq!(counter.count(), 18);
        assert!(approx(sampler.sample(1_000), 60.0));
    }

    #[test]
    fn concurrent_edges_are_not_lost() {
        let counter = EdgeCounter::new();
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| edges(&counter, 10_000));
            }
        });
        assert_eq!(counter.count(), 30_000);
    }

    #[test]
    fn pole_pairs_scale_edges_per_revolution() {
        let counter = EdgeCounter::new();
        let sampler = SpeedSampler::with_pole_pairs(&counter, 7);
        assert_eq!(sampler.edges_per_revolution(), 42.0);
    }

    #[test]
    fn absurd_pole_pairs_saturate() {
        let counter = EdgeCounter::new();
        let sampler = SpeedSampler::with_pole_pairs(&counter, u32::MAX);
        assert_eq!(sampler.edges_per_revolution(), u32::MAX as f32);
        let sampler = SpeedSampler::with_pole_pairs(&counter, 0);
        assert_eq!(sampler.edges_per_revolution(), 6.0);
    }
}
