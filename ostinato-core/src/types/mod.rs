// ostinato-core/src/types/mod.rs

pub mod event;
pub mod note;
pub mod pattern;
pub mod time;

pub use event::{EffectMap, Event, MusicalMap, ParamValue, REST};
pub use note::{midi_to_frequency, parse_note, NoteValue};
pub use pattern::{
    parse, resolve_deferred, span_cycles, ChannelId, Deferred, PatternBuilder, Source, TransformFn,
};
pub use time::Time;
