//! # Ostinato
//!
//! Ostinato is a live-coding pattern engine: rhythmic and melodic structure
//! is described with a compact mini-notation and a chainable transform
//! algebra, and the engine turns that description into a precisely-timed
//! stream of trigger events for an external sound-producing backend.
//!
//! The engine does not synthesize sound. Everything audible happens behind
//! the [`AudioBackend`] trait; this crate owns the transport clock, the
//! per-channel cycle scheduler, and the engine handle, while the pattern
//! representation and algebra live in `ostinato-core`.
//!
//! ## Modules
//!
//! - `audio`: the audio boundary trait, the transport clock, and the cycle
//!   scheduler that re-materializes deferred transforms each cycle.
//! - `config`: engine settings (tempo, jitter tolerance, failure budget).
//! - `engine`: the explicitly-constructed handle exposing the pattern
//!   surface: construction entry points, tempo control, playback.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ostinato::{ConsoleBackend, Engine};
//!
//! let engine = Engine::new(Arc::new(ConsoleBackend));
//! let drums = engine
//!     .sound("bd ~ sn ~")
//!     .every(4, |p| p.rev())
//!     .gain(0.9);
//! engine.play(&drums).unwrap();
//! ```

pub mod audio;
pub mod config;
pub mod engine;

// Re-export commonly used types and functions for convenience
pub use crate::audio::{AudioBackend, ConsoleBackend, NullBackend};
pub use crate::config::EngineConfig;
pub use crate::engine::Engine;
pub use ostinato_core::types::{ChannelId, Event, ParamValue, PatternBuilder, Source};
