//! Engine configuration.

use std::time::Duration;

/// Tunable engine settings. The defaults suit a typical live set; nothing
/// here is read from files or flags.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Initial tempo in cycles per second (135 bpm)
    pub cps: f64,
    /// How far in the past an event may fall and still be emitted at "now"
    /// instead of being dropped (absorbs timer jitter)
    pub late_tolerance: Duration,
    /// First retry delay after a failed cycle
    pub backoff_base: Duration,
    /// Upper bound on the retry delay
    pub backoff_cap: Duration,
    /// Consecutive failures before a channel is torn down
    pub max_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cps: 0.5625,
            late_tolerance: Duration::from_millis(100),
            backoff_base: Duration::from_millis(50),
            backoff_cap: Duration::from_secs(2),
            max_failures: 5,
        }
    }
}
