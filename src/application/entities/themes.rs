//! Themes tag organizations and projects. They change rarely, so they cache longer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::query::QueryOptions;
use crate::application::result::ServiceResult;
use crate::application::service::{CacheableService, EntityDefinition};
use crate::domain::entities::{OrganizationRecord, ProjectRecord, ThemeRecord};
use crate::domain::error::DomainError;
use crate::domain::validate;

use super::{ORGANIZATION_THEMES, PROJECT_THEMES, organizations, patch, projects};

pub const TABLE: &str = "tema";

const NOMBRE_MAX: usize = 100;
const DESCRIPCION_MAX: usize = 2_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTheme {
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
}

/// `None` leaves a column unchanged; `Some(None)` sets it to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateTheme {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub descripcion: Option<Option<String>>,
}

pub struct Themes;

impl EntityDefinition for Themes {
    type Entity = ThemeRecord;
    type Create = CreateTheme;
    type Update = UpdateTheme;

    const TABLE: &'static str = TABLE;
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["nombre", "descripcion"];
    const CACHE_TTL: Option<Duration> = Some(Duration::from_secs(60 * 60));

    fn validate_create(input: &CreateTheme) -> Result<(), DomainError> {
        validate::required("nombre", &input.nombre)?;
        validate::max_chars("nombre", Some(&input.nombre), NOMBRE_MAX)?;
        validate::max_chars("descripcion", input.descripcion.as_deref(), DESCRIPCION_MAX)
    }

    fn validate_update(input: &UpdateTheme) -> Result<(), DomainError> {
        validate::required_if_present("nombre", input.nombre.as_deref())?;
        validate::max_chars("nombre", input.nombre.as_deref(), NOMBRE_MAX)?;
        validate::max_chars("descripcion", patch::value(&input.descripcion), DESCRIPCION_MAX)
    }
}

pub type ThemeService = CacheableService<Themes>;

impl CacheableService<Themes> {
    pub async fn organizations(
        &self,
        theme_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<OrganizationRecord>> {
        self.get_related_entities(
            theme_id,
            TABLE,
            organizations::TABLE,
            ORGANIZATION_THEMES,
            options,
        )
        .await
    }

    pub async fn projects(
        &self,
        theme_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<ProjectRecord>> {
        self.get_related_entities(theme_id, TABLE, projects::TABLE, PROJECT_THEMES, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_are_rejected() {
        let err = Themes::validate_create(&CreateTheme {
            nombre: "x".repeat(NOMBRE_MAX + 1),
            descripcion: None,
        })
        .expect_err("too long");
        assert_eq!(err.field(), Some("nombre"));
    }
}
