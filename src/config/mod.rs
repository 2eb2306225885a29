//! Configuration model for holdfast.
//!
//! This module defines the Config struct that represents `<root>/holdfast.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of policy values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use types::TaskSettings;
