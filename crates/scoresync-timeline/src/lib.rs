pub mod event_timemap;
pub mod segment;
pub mod temporal_index;
pub mod timemap;

pub use event_timemap::*;
pub use segment::*;
pub use temporal_index::*;
pub use timemap::*;

/// Playback time in milliseconds.
pub type Millis = f64;

/// Position of an entry inside a [`Timemap`], which is what renderers and the
/// player call a "measure index".
pub type MeasureIndex = usize;
