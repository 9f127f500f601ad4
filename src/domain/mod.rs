//! Domain layer types and invariants.

pub mod constraints;
pub mod entities;
pub mod error;
pub mod quiz;
pub mod types;
