//! Shared helpers.

pub mod json;
pub mod telemetry;

pub use json::{from_json, is_valid_json, to_json};
pub use telemetry::init_tracing;
