//! Rolling-window scroll-velocity estimate (§4.3), backed by a fixed
//! capacity circular buffer of `(position, timestamp)` samples.

const WINDOW: usize = 5;
const MIN_RELIABLE_SAMPLES: usize = 3;
const STALENESS_MS: f64 = 250.0;
const IDLE_TIMEOUT_MS: f64 = 150.0;

#[derive(Debug, Clone, Copy)]
struct Sample {
    position: f64,
    time_ms: f64,
}

/// Estimates |Δposition|/Δtime over a small rolling window, resetting on
/// a stale gap and reporting `reliable = false` until enough samples have
/// accumulated.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    ring: [Option<Sample>; WINDOW],
    head: usize,
    len: usize,
    last_time_ms: Option<f64>,
    last_velocity: f64,
}

impl Default for VelocityTracker {
    fn default() -> Self { Self::new() }
}

/// Outcome of a single [`VelocityTracker::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityEstimate {
    /// Pixels per millisecond; always non-negative.
    pub velocity: f64,
    /// Whether enough samples have been gathered to trust `velocity`.
    pub reliable: bool,
}

impl VelocityTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self {
            ring: [None; WINDOW],
            head: 0,
            len: 0,
            last_time_ms: None,
            last_velocity: 0.0,
        }
    }

    /// Record a new `(position, time_ms)` sample and return the updated
    /// estimate. A gap since the previous sample exceeding
    /// [`STALENESS_MS`] resets the buffer.
    pub fn update(&mut self, position: f64, time_ms: f64) -> VelocityEstimate {
        if let Some(last) = self.last_time_ms {
            if time_ms - last > STALENESS_MS {
                self.reset_to(position, time_ms);
                return VelocityEstimate { velocity: 0.0, reliable: false };
            }
        }
        self.last_time_ms = Some(time_ms);
        self.ring[self.head] = Some(Sample { position, time_ms });
        self.head = (self.head + 1) % WINDOW;
        self.len = (self.len + 1).min(WINDOW);

        if self.len < MIN_RELIABLE_SAMPLES {
            self.last_velocity = 0.0;
            return VelocityEstimate { velocity: 0.0, reliable: false };
        }

        let oldest = self.oldest().expect("len >= MIN_RELIABLE_SAMPLES > 0");
        let dt = time_ms - oldest.time_ms;
        let velocity = if dt > 0.0 { (position - oldest.position).abs() / dt } else { 0.0 };
        self.last_velocity = velocity;
        VelocityEstimate { velocity, reliable: true }
    }

    /// Force the velocity to zero after no scroll activity for
    /// [`IDLE_TIMEOUT_MS`]; callers schedule this via their own idle timer.
    pub fn idle_timeout_ms(&self) -> f64 { IDLE_TIMEOUT_MS }

    /// Zero out the tracked velocity without discarding the sample
    /// history (used once the idle timer fires).
    pub fn zero(&mut self) { self.last_velocity = 0.0; }

    /// The most recently computed velocity (0 if unreliable or idle).
    pub fn current(&self) -> f64 { self.last_velocity }

    fn oldest(&self) -> Option<Sample> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + WINDOW - self.len) % WINDOW;
        self.ring[idx]
    }

    fn reset_to(&mut self, position: f64, time_ms: f64) {
        self.ring = [None; WINDOW];
        self.head = 0;
        self.len = 0;
        self.last_time_ms = Some(time_ms);
        self.ring[0] = Some(Sample { position, time_ms });
        self.head = 1;
        self.len = 1;
        self.last_velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreliable_until_minimum_samples() {
        let mut t = VelocityTracker::new();
        assert!(!t.update(0.0, 0.0).reliable);
        assert!(!t.update(10.0, 16.0).reliable);
        let est = t.update(20.0, 32.0);
        assert!(est.reliable);
        assert!(est.velocity > 0.0);
    }

    #[test]
    fn stale_gap_resets_buffer() {
        let mut t = VelocityTracker::new();
        t.update(0.0, 0.0);
        t.update(10.0, 16.0);
        t.update(20.0, 32.0);
        let est = t.update(1000.0, 5000.0);
        assert_eq!(est.velocity, 0.0);
        assert!(!est.reliable);
    }

    #[test]
    fn velocity_matches_delta_over_window() {
        let mut t = VelocityTracker::new();
        for i in 0..5 {
            t.update(i as f64 * 10.0, i as f64 * 16.0);
        }
        // window holds 5 samples spanning positions 0..40 over 0..64ms
        let est = t.update(50.0, 80.0);
        assert!(est.reliable);
        assert!((est.velocity - (50.0 - 10.0) / (80.0 - 16.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_clears_current_without_discarding_history() {
        let mut t = VelocityTracker::new();
        for i in 0..5 {
            t.update(i as f64 * 10.0, i as f64 * 16.0);
        }
        assert!(t.current() > 0.0);
        t.zero();
        assert_eq!(t.current(), 0.0);
    }
}
