//! Application layer: the generic entity services and their contracts.

pub mod entities;
pub mod error;
pub mod query;
pub mod repos;
pub mod result;
pub mod service;
