pub mod media;
pub mod renderer;

pub use media::*;
pub use renderer::*;
