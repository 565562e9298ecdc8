//! Time-domain and cycle-conditional transforms.
//!
//! Transforms fall into two classes with different evaluation timing.
//! Eager transforms (`fast`, `slow`, `rev`) rewrite the event sequence when
//! a builder is resolved. Deferred transforms (`every`, `sometimes`,
//! `whenmod`, `degrade`) are attached to events as annotations and
//! re-evaluated once per cycle by the scheduler, because their conditions
//! depend on the cycle number or fresh randomness rather than on static
//! pattern structure.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rand::Rng;

use crate::diag;
use crate::types::event::Event;
use crate::types::time::{cycles, from_f64, Time};

use super::builder::{ChannelId, PatternBuilder};

/// A user-supplied pattern transform, applied at schedule time.
pub type TransformFn = Arc<dyn Fn(PatternBuilder) -> PatternBuilder + Send + Sync>;

/// Probability used by [`PatternBuilder::often`].
pub const OFTEN: f64 = 0.75;
/// Probability used by [`PatternBuilder::rarely`].
pub const RARELY: f64 = 0.25;
/// Probability used by [`PatternBuilder::almost_never`].
pub const ALMOST_NEVER: f64 = 0.1;
/// Probability used by [`PatternBuilder::almost_always`].
pub const ALMOST_ALWAYS: f64 = 0.9;

/// Smallest accepted `fast`/`slow` factor.
pub const MIN_FACTOR: f64 = 0.1;

/// A deferred transform annotation carried on an event.
#[derive(Clone)]
pub enum Deferred {
    /// Apply `f` on cycles where `cycle % n == 0`
    Every { n: u32, f: TransformFn },
    /// Apply `f` when a fresh random draw lands below `prob`
    Sometimes { prob: f64, f: TransformFn },
    /// Apply `f` on cycles where `cycle % n == offset`
    Whenmod { n: u32, offset: u32, f: TransformFn },
    /// Drop the event when a fresh random draw lands below `prob`
    Degrade { prob: f64 },
}

impl Deferred {
    fn applies(&self, cycle: i64, rng: &mut impl Rng) -> bool {
        match self {
            Deferred::Every { n, .. } => cycle.rem_euclid(*n as i64) == 0,
            Deferred::Sometimes { prob, .. } => rng.gen::<f64>() < *prob,
            Deferred::Whenmod { n, offset, .. } => cycle.rem_euclid(*n as i64) == *offset as i64,
            Deferred::Degrade { .. } => false,
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Every { n, .. } => write!(f, "Every({})", n),
            Deferred::Sometimes { prob, .. } => write!(f, "Sometimes({})", prob),
            Deferred::Whenmod { n, offset, .. } => write!(f, "Whenmod({}, {})", n, offset),
            Deferred::Degrade { prob } => write!(f, "Degrade({})", prob),
        }
    }
}

/// An eager transform, applied in registration order when resolving.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Eager {
    Fast(Time),
    Slow(Time),
    Rev,
}

/// Convert a user-supplied factor to an exact rational, clamped to
/// [`MIN_FACTOR`]. Rational factors make `fast(n)` then `slow(n)` restore
/// the original times exactly.
pub(crate) fn clamp_factor(factor: f64) -> Time {
    from_f64(factor.max(MIN_FACTOR))
}

pub(crate) fn apply_eager(events: Vec<Event>, op: &Eager) -> Vec<Event> {
    match op {
        Eager::Fast(factor) => events
            .into_iter()
            .map(|mut e| {
                e.time = e.time / *factor;
                e.duration = e.duration / *factor;
                e
            })
            .collect(),
        Eager::Slow(factor) => events
            .into_iter()
            .map(|mut e| {
                e.time = e.time * *factor;
                e.duration = e.duration * *factor;
                e
            })
            .collect(),
        Eager::Rev => {
            let zero = cycles(0);
            let one = cycles(1);
            let mut mirrored: Vec<Event> = events
                .into_iter()
                .map(|mut e| {
                    let t = one - e.time - e.duration;
                    e.time = if t < zero { zero } else { t };
                    e
                })
                .collect();
            mirrored.reverse();
            mirrored
        }
    }
}

/// Re-materialize deferred transforms for one cycle.
///
/// For each annotated event, the annotation's condition is evaluated
/// against the channel-relative cycle number; when it holds, the transform
/// is applied to a singleton pattern containing just that event and the
/// result spliced in place of it. Events without annotations pass through
/// untouched. A transform that panics leaves its event as it was.
pub fn resolve_deferred(events: &[Event], cycle: i64) -> Vec<Event> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(events.len());

    for event in events {
        let mut current = vec![event.clone()];
        for annotation in &event.deferred {
            match annotation {
                Deferred::Degrade { prob } => {
                    current.retain(|_| rng.gen::<f64>() >= *prob);
                }
                Deferred::Every { f, .. }
                | Deferred::Sometimes { f, .. }
                | Deferred::Whenmod { f, .. } => {
                    if annotation.applies(cycle, &mut rng) {
                        current = current
                            .into_iter()
                            .flat_map(|e| apply_transform(f, e))
                            .collect();
                    }
                }
            }
            if current.is_empty() {
                break;
            }
        }
        out.append(&mut current);
    }

    out
}

/// Apply a user transform to a singleton pattern, keeping the original
/// event if the transform panics.
fn apply_transform(f: &TransformFn, event: Event) -> Vec<Event> {
    let singleton = PatternBuilder::from_events(vec![event.clone()], ChannelId::fresh());
    match catch_unwind(AssertUnwindSafe(|| f(singleton).resolve())) {
        Ok(resolved) => resolved,
        Err(_) => {
            diag::warn("deferred transform panicked, event left unchanged");
            vec![event]
        }
    }
}
