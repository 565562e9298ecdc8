//! Pattern builder and structural composition.
//!
//! A builder holds a base event sequence plus everything needed to resolve
//! it: pending eager transforms in registration order, deferred transform
//! annotations, effect settings, and musical-parameter bindings. Builders
//! are plain value types; composition never mutates an argument pattern.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::diag;
use crate::types::event::{EffectMap, Event, ParamValue, REST};
use crate::types::note::parse_note;
use crate::types::time::{ceil_cycles, Time};

use super::notation;
use super::transform::{
    apply_eager, clamp_factor, Deferred, Eager, ALMOST_ALWAYS, ALMOST_NEVER, OFTEN, RARELY,
};

/// Sampling resolution for generator sources.
const GENERATOR_STEPS: i64 = 16;

/// Identifier of one independently playable pattern stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocate a fresh, process-unique id.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ChannelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Callback source: sampled at [`GENERATOR_STEPS`] equal steps, receiving
/// the fractional position within the cycle.
pub type GeneratorFn = Arc<dyn Fn(f64) -> Option<String> + Send + Sync>;

/// The recognized pattern-source variants.
#[derive(Clone)]
pub enum Source {
    /// Mini-notation text
    Text(String),
    /// Ordered list; `None` or the rest marker is a skipped slot
    List(Vec<Option<String>>),
    /// Generator callback
    Generator(GeneratorFn),
    /// An already-built pattern, used fully resolved
    Pattern(Box<PatternBuilder>),
}

impl Source {
    pub fn generator(f: impl Fn(f64) -> Option<String> + Send + Sync + 'static) -> Self {
        Source::Generator(Arc::new(f))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Source::List(items) => f.debug_tuple("List").field(items).finish(),
            Source::Generator(_) => write!(f, "Generator(<callback>)"),
            Source::Pattern(b) => f.debug_tuple("Pattern").field(b).finish(),
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::Text(s.to_string())
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source::Text(s)
    }
}

impl From<Vec<&str>> for Source {
    fn from(items: Vec<&str>) -> Self {
        Source::List(items.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<String>> for Source {
    fn from(items: Vec<String>) -> Self {
        Source::List(items.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<String>>> for Source {
    fn from(items: Vec<Option<String>>) -> Self {
        Source::List(items)
    }
}

impl From<PatternBuilder> for Source {
    fn from(b: PatternBuilder) -> Self {
        Source::Pattern(Box::new(b))
    }
}

/// Builder for one pattern stream.
#[derive(Clone, Debug)]
pub struct PatternBuilder {
    base: Vec<Event>,
    pending: Vec<Eager>,
    deferred: Vec<Deferred>,
    musical: Vec<(String, Source)>,
    effects: EffectMap,
    gain: Option<f32>,
    pan: Option<f32>,
    channel: ChannelId,
}

impl PatternBuilder {
    /// Build from any pattern source.
    pub fn from_source(source: impl Into<Source>) -> Self {
        PatternBuilder {
            base: materialize(&source.into()),
            pending: Vec::new(),
            deferred: Vec::new(),
            musical: Vec::new(),
            effects: EffectMap::new(),
            gain: None,
            pan: None,
            channel: ChannelId::fresh(),
        }
    }

    /// Build directly from an event sequence (scheduler splicing,
    /// composition internals).
    pub fn from_events(events: Vec<Event>, channel: ChannelId) -> Self {
        PatternBuilder {
            base: events,
            pending: Vec::new(),
            deferred: Vec::new(),
            musical: Vec::new(),
            effects: EffectMap::new(),
            gain: None,
            pan: None,
            channel,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The base event sequence, before resolution.
    pub fn events(&self) -> &[Event] {
        &self.base
    }

    // ------------------------------------------------------------------
    // Structural composition
    // ------------------------------------------------------------------

    /// Union of all inputs' fully-resolved events over the same `[0,1)`
    /// span.
    pub fn stack(sources: Vec<Source>) -> Self {
        let mut events = Vec::new();
        for source in sources {
            events.extend(PatternBuilder::from_source(source).resolve());
        }
        PatternBuilder::from_events(events, ChannelId::fresh())
    }

    /// Sequential concatenation: each input is compressed into an equal
    /// `1/count`-wide slice of the cycle.
    pub fn cat(sources: Vec<Source>) -> Self {
        let count = sources.len() as i64;
        if count == 0 {
            return PatternBuilder::from_events(Vec::new(), ChannelId::fresh());
        }
        let slice = Time::new(1, count);
        let mut events = Vec::new();
        for (i, source) in sources.into_iter().enumerate() {
            let slot_start = slice * i as i64;
            for mut e in PatternBuilder::from_source(source).resolve() {
                e.time = slot_start + e.time * slice;
                e.duration = e.duration * slice;
                events.push(e);
            }
        }
        PatternBuilder::from_events(events, ChannelId::fresh())
    }

    /// Rhythm from one pattern, sounds from another: every active slot of
    /// the structure notation consumes the next sound event, wrapping
    /// around when the sound source is shorter.
    pub fn structure(structure: &str, sound: impl Into<Source>) -> Self {
        let slots = notation::parse(structure);
        let sounds: Vec<Event> = PatternBuilder::from_source(sound)
            .resolve()
            .into_iter()
            .filter(|e| !e.is_rest())
            .collect();
        if sounds.is_empty() {
            diag::warn("structure called with an empty sound source");
            return PatternBuilder::from_events(Vec::new(), ChannelId::fresh());
        }

        let events = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                let mut e = sounds[i % sounds.len()].clone();
                e.time = slot.time;
                e.duration = slot.duration;
                e
            })
            .collect();
        PatternBuilder::from_events(events, ChannelId::fresh())
    }

    /// Place another pattern after this one, shifted to the next whole
    /// cycle boundary past the current maximum end-time. This is how
    /// multi-cycle patterns are built.
    pub fn append(self, other: PatternBuilder) -> Self {
        let mut this = self.flushed();
        let boundary = match this.base.iter().map(Event::end).max() {
            Some(end) => Time::from_integer(ceil_cycles(end)),
            None => Time::from_integer(0),
        };
        for mut e in other.resolve() {
            e.time = e.time + boundary;
            this.base.push(e);
        }
        this
    }

    /// Merge another pattern's events into the same `[0,1)` span without
    /// shifting.
    pub fn overlay(self, other: PatternBuilder) -> Self {
        let mut this = self.flushed();
        this.base.extend(other.resolve());
        this
    }

    /// Union the pattern with a transformed copy of itself. The copy gets
    /// a fresh channel id and is fully resolved before merging.
    pub fn superimpose<F>(self, f: F) -> Self
    where
        F: FnOnce(PatternBuilder) -> PatternBuilder,
    {
        let mut copy = self.clone();
        copy.channel = ChannelId::fresh();
        let mut this = self.flushed();
        match catch_unwind(AssertUnwindSafe(move || f(copy).resolve())) {
            Ok(extra) => this.base.extend(extra),
            Err(_) => diag::warn("superimpose transform panicked, pattern unchanged"),
        }
        this
    }

    /// Bake everything registered so far into the base sequence, so later
    /// composition sees resolved events. Keeps the channel id.
    fn flushed(self) -> Self {
        let untouched = self.pending.is_empty()
            && self.deferred.is_empty()
            && self.musical.is_empty()
            && self.effects.is_empty()
            && self.gain.is_none()
            && self.pan.is_none();
        if untouched {
            return self;
        }
        let channel = self.channel;
        PatternBuilder::from_events(self.resolve(), channel)
    }

    // ------------------------------------------------------------------
    // Eager transforms
    // ------------------------------------------------------------------

    /// Compress times and durations by `factor` (clamped to 0.1).
    pub fn fast(mut self, factor: f64) -> Self {
        self.pending.push(Eager::Fast(clamp_factor(factor)));
        self
    }

    /// Alias of [`fast`](Self::fast).
    pub fn density(self, factor: f64) -> Self {
        self.fast(factor)
    }

    /// Stretch times and durations by `factor` (clamped to 0.1).
    pub fn slow(mut self, factor: f64) -> Self {
        self.pending.push(Eager::Slow(clamp_factor(factor)));
        self
    }

    /// Mirror the pattern within `[0,1)`.
    pub fn rev(mut self) -> Self {
        self.pending.push(Eager::Rev);
        self
    }

    // ------------------------------------------------------------------
    // Deferred transforms
    // ------------------------------------------------------------------

    /// Apply `f` on cycles divisible by `n`, decided per cycle at schedule
    /// time.
    pub fn every<F>(mut self, n: u32, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.deferred.push(Deferred::Every {
            n: n.max(1),
            f: Arc::new(f),
        });
        self
    }

    /// Apply `f` with probability `prob`, drawn fresh each cycle.
    pub fn sometimes<F>(mut self, prob: f64, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.deferred.push(Deferred::Sometimes {
            prob: prob.clamp(0.0, 1.0),
            f: Arc::new(f),
        });
        self
    }

    /// Apply `f` on cycles where `cycle % n == offset`.
    pub fn whenmod<F>(mut self, n: u32, offset: u32, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.deferred.push(Deferred::Whenmod {
            n: n.max(1),
            offset,
            f: Arc::new(f),
        });
        self
    }

    /// [`sometimes`](Self::sometimes) at probability 0.75.
    pub fn often<F>(self, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.sometimes(OFTEN, f)
    }

    /// [`sometimes`](Self::sometimes) at probability 0.25.
    pub fn rarely<F>(self, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.sometimes(RARELY, f)
    }

    /// [`sometimes`](Self::sometimes) at probability 0.1.
    pub fn almost_never<F>(self, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.sometimes(ALMOST_NEVER, f)
    }

    /// [`sometimes`](Self::sometimes) at probability 0.9.
    pub fn almost_always<F>(self, f: F) -> Self
    where
        F: Fn(PatternBuilder) -> PatternBuilder + Send + Sync + 'static,
    {
        self.sometimes(ALMOST_ALWAYS, f)
    }

    /// Randomly drop half of the events, decided per cycle.
    pub fn degrade(self) -> Self {
        self.degrade_by(0.5)
    }

    /// Randomly drop events with probability `prob`, decided per cycle.
    pub fn degrade_by(mut self, prob: f64) -> Self {
        self.deferred.push(Deferred::Degrade {
            prob: prob.clamp(0.0, 1.0),
        });
        self
    }

    // ------------------------------------------------------------------
    // Musical parameters
    // ------------------------------------------------------------------

    pub fn note(self, source: impl Into<Source>) -> Self {
        self.param("note", source)
    }

    pub fn up(self, source: impl Into<Source>) -> Self {
        self.param("up", source)
    }

    pub fn freq(self, source: impl Into<Source>) -> Self {
        self.param("freq", source)
    }

    pub fn midinote(self, source: impl Into<Source>) -> Self {
        self.param("midinote", source)
    }

    pub fn n(self, source: impl Into<Source>) -> Self {
        self.param("n", source)
    }

    fn param(mut self, name: &str, source: impl Into<Source>) -> Self {
        self.musical.push((name.to_string(), source.into()));
        self
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Gain for every event, in [0,1]. Wins over per-event values.
    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = Some(gain.clamp(0.0, 1.0));
        self
    }

    /// Stereo position for every event, 0 left to 1 right.
    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = Some(pan.clamp(0.0, 1.0));
        self
    }

    pub fn lpf(self, value: impl Into<ParamValue>) -> Self {
        self.effect("lpf", value)
    }

    pub fn hpf(self, value: impl Into<ParamValue>) -> Self {
        self.effect("hpf", value)
    }

    pub fn bpf(self, value: impl Into<ParamValue>) -> Self {
        self.effect("bpf", value)
    }

    pub fn delay(self, value: impl Into<ParamValue>) -> Self {
        self.effect("delay", value)
    }

    pub fn reverb(self, value: impl Into<ParamValue>) -> Self {
        self.effect("reverb", value)
    }

    pub fn distortion(self, value: impl Into<ParamValue>) -> Self {
        self.effect("distortion", value)
    }

    pub fn crush(self, value: impl Into<ParamValue>) -> Self {
        self.effect("crush", value)
    }

    pub fn vowel(self, value: impl Into<ParamValue>) -> Self {
        self.effect("vowel", value)
    }

    fn effect(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.effects.insert(name.to_string(), value.into());
        self
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Materialize the pattern: bind musical parameters, apply eager
    /// transforms in registration order, attach deferred annotations, and
    /// merge builder-level effect settings (builder values win).
    pub fn resolve(&self) -> Vec<Event> {
        let mut events = self.base.clone();

        for (name, source) in &self.musical {
            events = bind_param(events, name, source);
        }

        for op in &self.pending {
            events = apply_eager(events, op);
        }

        if !self.deferred.is_empty() {
            for e in &mut events {
                e.deferred.extend(self.deferred.iter().cloned());
            }
        }

        for e in &mut events {
            for (k, v) in &self.effects {
                e.effects.insert(k.clone(), v.clone());
            }
            if self.gain.is_some() {
                e.gain = self.gain;
            }
            if self.pan.is_some() {
                e.pan = self.pan;
            }
        }

        events
    }
}

impl fmt::Display for PatternBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for (i, e) in self.base.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", e.sample)?;
        }
        write!(f, "\"")
    }
}

/// Total span of an event sequence in whole cycles, at least 1.
pub fn span_cycles(events: &[Event]) -> i64 {
    events
        .iter()
        .map(Event::end)
        .max()
        .map(|end| ceil_cycles(end).max(1))
        .unwrap_or(1)
}

fn materialize(source: &Source) -> Vec<Event> {
    match source {
        Source::Text(s) => notation::parse(s),
        Source::List(items) => {
            if items.is_empty() {
                return Vec::new();
            }
            let slice = Time::new(1, items.len() as i64);
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Some(name) if name != REST => {
                        Some(Event::new(name.clone(), slice * i as i64, slice))
                    }
                    _ => None,
                })
                .collect()
        }
        Source::Generator(f) => {
            let slice = Time::new(1, GENERATOR_STEPS);
            (0..GENERATOR_STEPS)
                .filter_map(|i| {
                    let pos = i as f64 / GENERATOR_STEPS as f64;
                    // A failing callback silences its own step only.
                    let name = match catch_unwind(AssertUnwindSafe(|| f(pos))) {
                        Ok(name) => name?,
                        Err(_) => {
                            diag::warn("generator callback panicked, step skipped");
                            return None;
                        }
                    };
                    if name == REST {
                        return None;
                    }
                    Some(Event::new(name, slice * i, slice))
                })
                .collect()
        }
        Source::Pattern(b) => b.resolve(),
    }
}

/// Values a musical-parameter source yields, in time order.
fn param_values(source: &Source) -> Vec<String> {
    match source {
        Source::Pattern(b) => b
            .resolve()
            .into_iter()
            .filter(|e| !e.is_rest())
            .map(|e| e.sample)
            .collect(),
        other => materialize(other).into_iter().map(|e| e.sample).collect(),
    }
}

/// Zip parameter values onto events index-wise with wraparound, expanding
/// the event sequence first when the parameter pattern is denser.
fn bind_param(events: Vec<Event>, name: &str, source: &Source) -> Vec<Event> {
    let values = param_values(source);
    if values.is_empty() {
        diag::warn(&format!("parameter '{}' resolved to no values, ignored", name));
        return events;
    }
    if events.is_empty() {
        return events;
    }

    let mut events = if values.len() > events.len() {
        expand(events, values.len())
    } else {
        events
    };

    for (i, e) in events.iter_mut().enumerate() {
        let raw = &values[i % values.len()];
        e.musical.insert(name.to_string(), resolve_value(name, raw));
    }
    events
}

/// Numeric tokens pass through; note names resolve to Hz for `freq` and to
/// the MIDI number for every other musical parameter.
fn resolve_value(name: &str, raw: &str) -> f32 {
    if let Ok(v) = raw.parse::<f32>() {
        return v;
    }
    let note = parse_note(raw);
    if name == "freq" {
        note.frequency
    } else {
        note.midi as f32
    }
}

/// Re-slice into `n` equal-width events, inheriting samples cyclically.
fn expand(events: Vec<Event>, n: usize) -> Vec<Event> {
    let slice = Time::new(1, n as i64);
    (0..n)
        .map(|i| {
            let mut e = events[i % events.len()].clone();
            e.time = slice * i as i64;
            e.duration = slice;
            e
        })
        .collect()
}
