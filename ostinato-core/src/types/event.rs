//! Event value type flowing through the pattern pipeline.

use std::collections::BTreeMap;

use super::pattern::Deferred;
use super::time::{floor_cycles, Time};

/// The rest marker in mini-notation and list sources.
pub const REST: &str = "~";

/// Value of an effect parameter. Most effects take a single number; a few
/// (delay) take a small array.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    Number(f32),
    List(Vec<f32>),
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Number(v)
    }
}

impl From<Vec<f32>> for ParamValue {
    fn from(v: Vec<f32>) -> Self {
        ParamValue::List(v)
    }
}

impl From<&[f32]> for ParamValue {
    fn from(v: &[f32]) -> Self {
        ParamValue::List(v.to_vec())
    }
}

/// Effect-parameter name to value (`lpf`, `delay`, `reverb`, ...).
pub type EffectMap = BTreeMap<String, ParamValue>;

/// Musical-parameter name to resolved numeric value (`note`, `freq`, ...).
pub type MusicalMap = BTreeMap<String, f32>;

/// One scheduled trigger with a position and duration within a cycle.
///
/// Positions are rational cycle fractions: one cycle spans `[0,1)`, and
/// `time` may exceed 1 for multi-cycle patterns built with `append`.
/// Events are value types; every transform produces a new sequence.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Sound identifier, or [`REST`]
    pub sample: String,
    /// Start position in cycles
    pub time: Time,
    /// Length in cycles, > 0 for non-rest events
    pub duration: Time,
    /// Gain override in [0,1]; unset inherits the backend default
    pub gain: Option<f32>,
    /// Stereo position override; unset inherits the backend default
    pub pan: Option<f32>,
    /// Resolved musical parameters, populated by the algebra
    pub musical: MusicalMap,
    /// Effect parameters merged from builder-level settings
    pub effects: EffectMap,
    /// Cycle-conditional transforms, re-evaluated by the scheduler
    #[cfg_attr(feature = "serde", serde(skip))]
    pub deferred: Vec<Deferred>,
}

impl Event {
    pub fn new(sample: impl Into<String>, time: Time, duration: Time) -> Self {
        Event {
            sample: sample.into(),
            time,
            duration,
            gain: None,
            pan: None,
            musical: MusicalMap::new(),
            effects: EffectMap::new(),
            deferred: Vec::new(),
        }
    }

    pub fn is_rest(&self) -> bool {
        self.sample == REST
    }

    /// End position (`time + duration`) in cycles
    pub fn end(&self) -> Time {
        self.time + self.duration
    }

    /// The whole cycle this event occurs in (0 for single-cycle patterns)
    pub fn cycle(&self) -> i64 {
        floor_cycles(self.time)
    }

    /// Start position relative to the start of its own cycle, in `[0,1)`
    pub fn time_in_cycle(&self) -> Time {
        self.time - Time::from_integer(self.cycle())
    }
}

// Deferred transforms hold closures and are excluded from comparison; two
// events are equal when everything observable at emission time matches.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.sample == other.sample
            && self.time == other.time
            && self.duration == other.duration
            && self.gain == other.gain
            && self.pan == other.pan
            && self.musical == other.musical
            && self.effects == other.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::time::time;

    #[test]
    fn test_rest_marker() {
        let e = Event::new(REST, time(0, 1), time(1, 2));
        assert!(e.is_rest());
        assert!(!Event::new("bd", time(0, 1), time(1, 2)).is_rest());
    }

    #[test]
    fn test_cycle_position() {
        let e = Event::new("bd", time(5, 4), time(1, 4));
        assert_eq!(e.cycle(), 1);
        assert_eq!(e.time_in_cycle(), time(1, 4));
        assert_eq!(e.end(), time(3, 2));
    }
}
