//! CLI command implementations.

pub mod cursor;
pub mod serve;
