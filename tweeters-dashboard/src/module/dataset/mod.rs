//! Dataset loading
//!
//! Fetches the device's CSV snapshots for one date prefix and normalizes
//! them into typed snapshots. A missing remote file is expected (fresh
//! deployments, gaps in collection) and yields an empty snapshot; every
//! other failure is a [`LoadError`].

pub mod catalog;
pub mod loader;
pub mod parser;

pub use catalog::Catalog;
pub use loader::{Dataset, DatasetLoader, LoadError};
pub use parser::{common_name, hour_of_day, parse_timestamp};
