//! HTTP request handlers.

pub mod domains;
pub mod health;
