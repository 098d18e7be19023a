pub mod decode;
pub mod error;

pub use decode::*;
pub use error::*;
