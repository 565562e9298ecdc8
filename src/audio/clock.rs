//! Transport clock: the process-wide wall-clock-to-cycle mapping.
//!
//! One clock is shared by every channel, so a tempo change takes effect for
//! all of them on their next scheduling decision. Cycle boundaries are
//! always computed from the fixed start instant, never from "now plus an
//! interval", which keeps long-running transports free of cumulative drift.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tempo bounds in cycles per second
pub const MIN_CPS: f64 = 0.1;
pub const MAX_CPS: f64 = 10.0;

/// Tempo bounds in beats per minute
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Shared transport state: tempo and the instant playback began.
pub struct TransportClock {
    /// cps stored as f64 bits for atomic updates
    cps: AtomicU64,
    start: Instant,
}

impl TransportClock {
    /// Create a clock starting at `start` (the instant the audio boundary
    /// became ready) with the given tempo.
    pub fn new(cps: f64, start: Instant) -> Self {
        TransportClock {
            cps: AtomicU64::new(cps.clamp(MIN_CPS, MAX_CPS).to_bits()),
            start,
        }
    }

    /// Current tempo in cycles per second
    pub fn cps(&self) -> f64 {
        f64::from_bits(self.cps.load(Ordering::Relaxed))
    }

    /// Set the tempo, clamped to `[0.1, 10]`. Takes effect on the next
    /// scheduling decision; already-emitted events are not rewritten.
    pub fn set_cps(&self, cps: f64) {
        self.cps
            .store(cps.clamp(MIN_CPS, MAX_CPS).to_bits(), Ordering::Relaxed);
    }

    /// Set the tempo in beats per minute, clamped to `[20, 300]`.
    pub fn set_tempo(&self, bpm: f64) {
        self.set_cps(bpm.clamp(MIN_BPM, MAX_BPM) / 240.0);
    }

    /// Wall-clock duration of one cycle at the current tempo
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.cps())
    }

    /// The cycle number `now` falls in: `floor((now - start) * cps)`
    pub fn current_cycle(&self, now: Instant) -> i64 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        (elapsed * self.cps()).floor() as i64
    }

    /// The instant cycle `cycle` begins
    pub fn instant_of_cycle(&self, cycle: i64) -> Instant {
        self.start + Duration::from_secs_f64(cycle.max(0) as f64 / self.cps())
    }

    /// The instant of a fractional position `frac` within `cycle`
    pub fn instant_within_cycle(&self, cycle: i64, frac: f64) -> Instant {
        self.start + Duration::from_secs_f64((cycle.max(0) as f64 + frac) / self.cps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_math() {
        let start = Instant::now();
        let clock = TransportClock::new(2.0, start);

        assert_eq!(clock.current_cycle(start), 0);
        assert_eq!(clock.current_cycle(start + Duration::from_millis(2600)), 5);
        assert_eq!(
            clock.instant_of_cycle(3),
            start + Duration::from_millis(1500)
        );
        assert_eq!(
            clock.instant_within_cycle(1, 0.5),
            start + Duration::from_millis(750)
        );
    }

    #[test]
    fn test_cps_clamped() {
        let clock = TransportClock::new(100.0, Instant::now());
        assert_eq!(clock.cps(), MAX_CPS);

        clock.set_cps(0.0001);
        assert_eq!(clock.cps(), MIN_CPS);
    }

    #[test]
    fn test_tempo_in_bpm() {
        let clock = TransportClock::new(1.0, Instant::now());
        clock.set_tempo(120.0);
        assert_eq!(clock.cps(), 0.5);

        // clamped to 300 bpm
        clock.set_tempo(1000.0);
        assert_eq!(clock.cps(), 1.25);
    }

    #[test]
    fn test_cycle_duration_follows_tempo() {
        let clock = TransportClock::new(2.0, Instant::now());
        assert_eq!(clock.cycle_duration(), Duration::from_millis(500));
    }
}
