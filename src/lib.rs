//! Cacheable entity services for a community directory.
//!
//! [`application::service::CacheableService`] layers a read-through cache and
//! junction-table relations over [`application::service::BaseService`], which
//! talks to any [`application::repos::EntityStore`]. The concrete services for
//! organizations, projects, themes and people live in
//! [`application::entities`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
