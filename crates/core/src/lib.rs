//! Domain model shared by every crate in the stream resolver.
//!
//! This crate owns nothing network- or HTML-facing; it is the vocabulary
//! the aggregator, scrapers, infrastructure, and api crates share.

pub mod episode_matcher;
pub mod error;
pub mod models;

// Re-export core types
pub use error::*;
pub use models::*;
