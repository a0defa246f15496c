//! Domain layer types and invariants.

pub mod deletion;
pub mod entities;
pub mod error;
pub mod validate;
