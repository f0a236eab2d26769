//! SQL text generation.
//!
//! This module owns every dialect-specific decision: identifier quoting,
//! placeholder style, paging syntax, and function spelling. Everything else
//! in the crate works with the dialect-neutral [`crate::models::QueryDescriptor`].

pub mod builder;
pub mod dialect;
pub mod functions;

pub use builder::build;
pub use dialect::Dialect;
pub use functions::SqlFunction;
