//! CLI command implementations.

pub mod list;
pub mod openapi;
pub mod serve;
