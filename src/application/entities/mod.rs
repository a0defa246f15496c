//! Concrete entity services.
//!
//! Each module declares an [`EntityDefinition`](crate::application::service::EntityDefinition)
//! (table, searchable fields, TTL, validators) and the relation accessors for
//! its many-to-many edges. Junction tables are shared between both ends of an
//! edge, so their names live here.

use std::sync::Arc;
use std::time::Duration;

use crate::application::repos::EntityStore;
use crate::cache::CacheAdapter;

pub mod organizations;
mod patch;
pub mod people;
pub mod projects;
pub mod themes;

pub use organizations::{CreateOrganization, OrganizationService, Organizations, UpdateOrganization};
pub use people::{CreatePerson, People, PersonService, UpdatePerson};
pub use projects::{CreateProject, ProjectService, Projects, UpdateProject};
pub use themes::{CreateTheme, ThemeService, Themes, UpdateTheme};

pub const ORGANIZATION_THEMES: &str = "organizacion_tema";
pub const ORGANIZATION_PROJECTS: &str = "organizacion_proyecto";
pub const PROJECT_THEMES: &str = "proyecto_tema";
pub const PROJECT_AUTHORS: &str = "proyecto_persona";

/// One service per entity, sharing a store and a cache.
#[derive(Clone)]
pub struct Services {
    pub organizations: OrganizationService,
    pub projects: ProjectService,
    pub themes: ThemeService,
    pub people: PersonService,
}

impl Services {
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheAdapter>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            organizations: OrganizationService::new(store.clone(), cache.clone(), default_ttl),
            projects: ProjectService::new(store.clone(), cache.clone(), default_ttl),
            themes: ThemeService::new(store.clone(), cache.clone(), default_ttl),
            people: PersonService::new(store, cache, default_ttl),
        }
    }
}
