pub mod path;
pub mod processor;

pub use path::*;
pub use processor::*;
