//! # Vast Utils
//!
//! Infrastructure utilities for the Vast client.
//! This crate contains table cell formatting, argument parsers and the
//! bounded retry pool used by batch operations.

pub mod errors;
pub mod formatters;
pub mod parsers;
pub mod retry;

// Re-export common types for convenience
pub use errors::*;
pub use formatters::*;
pub use parsers::*;
pub use retry::*;
