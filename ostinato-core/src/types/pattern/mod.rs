//! Pattern representation: mini-notation parsing, the builder algebra, and
//! the transform pipeline.

mod builder;
mod notation;
mod transform;


// Re-export public types
pub use builder::{span_cycles, ChannelId, GeneratorFn, PatternBuilder, Source};
pub use notation::parse;
pub use transform::{
    resolve_deferred, Deferred, TransformFn, ALMOST_ALWAYS, ALMOST_NEVER, MIN_FACTOR, OFTEN,
    RARELY,
};
