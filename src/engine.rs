//! The engine handle: the single entry point to the pattern surface.
//!
//! Construction entry points, tempo control, and playback all hang off an
//! explicitly-constructed [`Engine`] owning the transport clock and the
//! scheduler; there is no ambient global state to register against.

use std::sync::Arc;

use anyhow::{bail, Result};
use rand::seq::SliceRandom;

use ostinato_core::types::{ChannelId, PatternBuilder, Source};

use crate::audio::boundary::AudioBackend;
use crate::audio::clock::TransportClock;
use crate::audio::scheduler::{CycleScheduler, SchedulerHandle};
use crate::config::EngineConfig;

pub struct Engine {
    clock: Arc<TransportClock>,
    scheduler: SchedulerHandle,
    backend: Arc<dyn AudioBackend>,
}

impl Engine {
    /// Create an engine over an audio backend with default settings.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Self {
        let clock = Arc::new(TransportClock::new(config.cps, backend.now()));
        let scheduler = CycleScheduler::spawn(clock.clone(), backend.clone(), config);
        Engine {
            clock,
            scheduler,
            backend,
        }
    }

    // ------------------------------------------------------------------
    // Construction entry points
    // ------------------------------------------------------------------

    /// Build a pattern from notation text, a list, a generator callback,
    /// or another pattern.
    pub fn sound(&self, source: impl Into<Source>) -> PatternBuilder {
        PatternBuilder::from_source(source)
    }

    /// All sources playing simultaneously over the same cycle.
    pub fn stack(&self, sources: Vec<Source>) -> PatternBuilder {
        PatternBuilder::stack(sources)
    }

    /// Alias of [`stack`](Self::stack).
    pub fn layer(&self, sources: Vec<Source>) -> PatternBuilder {
        PatternBuilder::stack(sources)
    }

    /// Sources played back to back, each compressed into an equal slice.
    pub fn cat(&self, sources: Vec<Source>) -> PatternBuilder {
        PatternBuilder::cat(sources)
    }

    /// Rhythm from `structure` notation, sounds from `sound`.
    pub fn structure(&self, structure: &str, sound: impl Into<Source>) -> PatternBuilder {
        PatternBuilder::structure(structure, sound)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Resolve a pattern and start (or replace) its channel.
    pub fn play(&self, pattern: &PatternBuilder) -> Result<()> {
        if !self.backend.is_ready() {
            bail!("audio backend is not ready");
        }
        self.scheduler.play(pattern.channel(), pattern.resolve())
    }

    /// Stop one channel.
    pub fn stop(&self, channel: ChannelId) {
        self.scheduler.stop(channel);
    }

    /// Stop every channel.
    pub fn stop_all(&self) {
        self.scheduler.stop_all();
    }

    // ------------------------------------------------------------------
    // Tempo and selection
    // ------------------------------------------------------------------

    /// Set the tempo in cycles per second, clamped to `[0.1, 10]`.
    pub fn set_cps(&self, cps: f64) {
        self.clock.set_cps(cps);
    }

    /// Set the tempo in beats per minute, clamped to `[20, 300]`.
    pub fn set_tempo(&self, bpm: f64) {
        self.clock.set_tempo(bpm);
    }

    pub fn cps(&self) -> f64 {
        self.clock.cps()
    }

    /// The cycle number the transport is in right now.
    pub fn current_cycle(&self) -> i64 {
        self.clock.current_cycle(self.backend.now())
    }

    /// Uniform random pick.
    pub fn choose<'a, T>(&self, options: &'a [T]) -> Option<&'a T> {
        options.choose(&mut rand::thread_rng())
    }

    /// Deterministic pick, indexed by the current cycle modulo the list
    /// length.
    pub fn cycle_choose<'a, T>(&self, options: &'a [T]) -> Option<&'a T> {
        if options.is_empty() {
            return None;
        }
        let idx = self.current_cycle().rem_euclid(options.len() as i64) as usize;
        options.get(idx)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::boundary::NullBackend;

    fn engine() -> Engine {
        Engine::new(Arc::new(NullBackend))
    }

    #[test]
    fn test_play_and_stop_roundtrip() {
        let engine = engine();
        let pattern = engine.sound("bd sn");
        let channel = pattern.channel();
        assert!(engine.play(&pattern).is_ok());
        engine.stop(channel);
        engine.stop_all();
    }

    #[test]
    fn test_tempo_controls() {
        let engine = engine();
        engine.set_cps(2.0);
        assert_eq!(engine.cps(), 2.0);
        engine.set_tempo(120.0);
        assert_eq!(engine.cps(), 0.5);
    }

    #[test]
    fn test_choose_picks_a_member() {
        let engine = engine();
        let options = ["bd", "sn", "hh"];
        let picked = engine.choose(&options).unwrap();
        assert!(options.contains(picked));
        assert!(engine.choose::<&str>(&[]).is_none());
    }

    #[test]
    fn test_cycle_choose_is_deterministic() {
        let engine = engine();
        let options = ["bd", "sn", "hh"];
        let a = engine.cycle_choose(&options).unwrap();
        let b = engine.cycle_choose(&options).unwrap();
        assert_eq!(a, b);
    }
}
