//! Shared data model for the Tweeters dashboard
//!
//! Record types, the fixed message table schema and dataset snapshots.
//! The loader produces these and the renderer consumes them, so a schema
//! mismatch between the two is a type error.

mod types;
pub use types::*;
