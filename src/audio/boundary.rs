//! The audio boundary: everything that turns an event into sound lives on
//! the other side of this trait.

use std::time::Instant;

use colored::Colorize;
use ostinato_core::types::{EffectMap, MusicalMap};

/// External sound-producing backend.
///
/// `trigger` is expected to be effectively non-blocking and to schedule
/// sound production for `at`, which may be slightly in the future. The
/// backend also reports readiness and supplies the time source the
/// transport clock is built from.
pub trait AudioBackend: Send + Sync {
    /// Schedule one trigger. Fire and forget; never blocks the scheduler.
    fn trigger(
        &self,
        sample: &str,
        gain: f32,
        effects: &EffectMap,
        musical: &MusicalMap,
        at: Instant,
    );

    /// Whether the backend is initialized and able to produce sound.
    fn is_ready(&self) -> bool;

    /// The backend's notion of "now".
    fn now(&self) -> Instant;
}

/// Prints every trigger to stderr. Useful for dry runs without a synth.
#[derive(Debug, Default)]
pub struct ConsoleBackend;

impl AudioBackend for ConsoleBackend {
    fn trigger(
        &self,
        sample: &str,
        gain: f32,
        effects: &EffectMap,
        musical: &MusicalMap,
        at: Instant,
    ) {
        let lead = at.saturating_duration_since(Instant::now());
        let mut line = format!("{} gain={:.2} +{}ms", sample.cyan(), gain, lead.as_millis());
        if !musical.is_empty() {
            line.push_str(&format!(" {:?}", musical));
        }
        if !effects.is_empty() {
            line.push_str(&format!(" {:?}", effects));
        }
        eprintln!("{} {}", "trigger".green(), line);
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Drops every trigger.
#[derive(Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn trigger(&self, _: &str, _: f32, _: &EffectMap, _: &MusicalMap, _: Instant) {}

    fn is_ready(&self) -> bool {
        true
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
