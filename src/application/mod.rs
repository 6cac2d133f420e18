//! Application services layer.

pub mod assets;
pub mod content;
pub mod error;
pub mod repos;
