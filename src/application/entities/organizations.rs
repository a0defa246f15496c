//! Organizations directory.

use serde::{Deserialize, Serialize};

use crate::application::query::QueryOptions;
use crate::application::result::ServiceResult;
use crate::application::service::{CacheableService, EntityDefinition};
use crate::domain::entities::{OrganizationRecord, ProjectRecord, ThemeRecord};
use crate::domain::error::DomainError;
use crate::domain::validate;

use super::{ORGANIZATION_PROJECTS, ORGANIZATION_THEMES, patch, projects, themes};

pub const TABLE: &str = "organizacion";

const NOMBRE_MAX: usize = 200;
const DESCRIPCION_MAX: usize = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitio_web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localidad: Option<String>,
}

/// `None` leaves a column unchanged; `Some(None)` sets it to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOrganization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub descripcion: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub sitio_web: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub localidad: Option<Option<String>>,
}

pub struct Organizations;

impl EntityDefinition for Organizations {
    type Entity = OrganizationRecord;
    type Create = CreateOrganization;
    type Update = UpdateOrganization;

    const TABLE: &'static str = TABLE;
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["nombre", "descripcion"];
    const SOFT_DELETE: bool = true;

    fn validate_create(input: &CreateOrganization) -> Result<(), DomainError> {
        validate::required("nombre", &input.nombre)?;
        validate::max_chars("nombre", Some(&input.nombre), NOMBRE_MAX)?;
        validate::max_chars("descripcion", input.descripcion.as_deref(), DESCRIPCION_MAX)?;
        validate::optional_web_url("sitio_web", input.sitio_web.as_deref())?;
        validate::optional_email("email", input.email.as_deref())
    }

    fn validate_update(input: &UpdateOrganization) -> Result<(), DomainError> {
        validate::required_if_present("nombre", input.nombre.as_deref())?;
        validate::max_chars("nombre", input.nombre.as_deref(), NOMBRE_MAX)?;
        validate::max_chars("descripcion", patch::value(&input.descripcion), DESCRIPCION_MAX)?;
        validate::optional_web_url("sitio_web", patch::value(&input.sitio_web))?;
        validate::optional_email("email", patch::value(&input.email))
    }
}

pub type OrganizationService = CacheableService<Organizations>;

impl CacheableService<Organizations> {
    pub async fn themes(
        &self,
        organization_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<ThemeRecord>> {
        self.get_related_entities(
            organization_id,
            TABLE,
            themes::TABLE,
            ORGANIZATION_THEMES,
            options,
        )
        .await
    }

    pub async fn projects(
        &self,
        organization_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<ProjectRecord>> {
        self.get_related_entities(
            organization_id,
            TABLE,
            projects::TABLE,
            ORGANIZATION_PROJECTS,
            options,
        )
        .await
    }

    pub async fn add_theme(&self, organization_id: &str, theme_id: &str) -> ServiceResult<bool> {
        self.link_related(organization_id, TABLE, themes::TABLE, ORGANIZATION_THEMES, theme_id)
            .await
    }

    pub async fn remove_theme(&self, organization_id: &str, theme_id: &str) -> ServiceResult<bool> {
        self.unlink_related(organization_id, TABLE, themes::TABLE, ORGANIZATION_THEMES, theme_id)
            .await
    }

    pub async fn add_project(&self, organization_id: &str, project_id: &str) -> ServiceResult<bool> {
        self.link_related(
            organization_id,
            TABLE,
            projects::TABLE,
            ORGANIZATION_PROJECTS,
            project_id,
        )
        .await
    }

    pub async fn remove_project(
        &self,
        organization_id: &str,
        project_id: &str,
    ) -> ServiceResult<bool> {
        self.unlink_related(
            organization_id,
            TABLE,
            projects::TABLE,
            ORGANIZATION_PROJECTS,
            project_id,
        )
        .await
    }
}
