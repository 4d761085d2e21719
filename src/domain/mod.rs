//! Domain layer types and invariants.

pub mod error;
pub mod template;
pub mod types;
