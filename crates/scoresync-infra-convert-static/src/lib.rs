pub mod converter;
pub mod source;

pub use converter::*;
pub use source::*;
