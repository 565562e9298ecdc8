//! # Ostinato Core
//!
//! Engine-independent core of the ostinato live-coding pattern engine:
//! the event model, the mini-notation parser, the pattern-builder algebra,
//! and the transform pipeline. No audio, no threads, no wall clock; the
//! real-time side lives in the `ostinato` crate.
//!
//! ## Features
//!
//! - **serde**: JSON serialization for the value types
//! - **colored**: colored warning output (default)
//!
//! ## Example
//!
//! ```
//! use ostinato_core::types::PatternBuilder;
//!
//! let pattern = PatternBuilder::from_source("bd ~ sn ~").fast(2.0);
//! let events = pattern.resolve();
//! assert_eq!(events.len(), 2);
//! ```

pub(crate) mod diag;
pub mod types;

// Re-export commonly used types
pub use types::{ChannelId, Event, ParamValue, PatternBuilder, Source, Time};
