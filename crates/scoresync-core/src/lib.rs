pub mod cache;
pub mod clock;
pub mod error;
mod follow;
pub mod midi;
pub mod options;
pub mod player;
pub mod score;
pub mod tempo;

pub use cache::*;
pub use clock::*;
pub use error::*;
pub use midi::*;
pub use options::*;
pub use player::*;
pub use score::*;
pub use tempo::*;
