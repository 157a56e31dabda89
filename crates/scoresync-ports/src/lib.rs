pub mod cache;
pub mod clock;
pub mod config;
pub mod container;
pub mod converter;
pub mod renderer;
pub mod transform;
pub mod types;

pub use cache::*;
pub use clock::*;
pub use config::*;
pub use container::*;
pub use converter::*;
pub use renderer::*;
pub use transform::*;
pub use types::*;
