pub mod json;
pub mod markdown;
pub mod summary;
pub mod text;

#[cfg(test)]
pub(crate) mod fixtures;

pub use json::*;
pub use markdown::*;
pub use summary::*;
pub use text::*;
