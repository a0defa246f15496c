//! Community projects, their themes, authors and backing organizations.

use serde::{Deserialize, Serialize};

use crate::application::query::QueryOptions;
use crate::application::result::ServiceResult;
use crate::application::service::{CacheableService, EntityDefinition};
use crate::domain::entities::{OrganizationRecord, PersonRecord, ProjectRecord, ThemeRecord};
use crate::domain::error::DomainError;
use crate::domain::validate;

use super::{
    ORGANIZATION_PROJECTS, PROJECT_AUTHORS, PROJECT_THEMES, organizations, patch, people, themes,
};

pub const TABLE: &str = "proyecto";

const NOMBRE_MAX: usize = 200;
const DESCRIPCION_MAX: usize = 10_000;
const ESTADO_MAX: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateProject {
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitio_web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositorio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
}

/// `None` leaves a column unchanged; `Some(None)` sets it to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProject {
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
    pub repositorio: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub estado: Option<Option<String>>,
}

pub struct Projects;

impl EntityDefinition for Projects {
    type Entity = ProjectRecord;
    type Create = CreateProject;
    type Update = UpdateProject;

    const TABLE: &'static str = TABLE;
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["nombre", "descripcion"];
    const SOFT_DELETE: bool = true;

    fn validate_create(input: &CreateProject) -> Result<(), DomainError> {
        validate::required("nombre", &input.nombre)?;
        check_common(
            Some(&input.nombre),
            input.descripcion.as_deref(),
            input.sitio_web.as_deref(),
            input.repositorio.as_deref(),
            input.estado.as_deref(),
        )
    }

    fn validate_update(input: &UpdateProject) -> Result<(), DomainError> {
        validate::required_if_present("nombre", input.nombre.as_deref())?;
        check_common(
            input.nombre.as_deref(),
            patch::value(&input.descripcion),
            patch::value(&input.sitio_web),
            patch::value(&input.repositorio),
            patch::value(&input.estado),
        )
    }
}

fn check_common(
    nombre: Option<&str>,
    descripcion: Option<&str>,
    sitio_web: Option<&str>,
    repositorio: Option<&str>,
    estado: Option<&str>,
) -> Result<(), DomainError> {
    validate::max_chars("nombre", nombre, NOMBRE_MAX)?;
    validate::max_chars("descripcion", descripcion, DESCRIPCION_MAX)?;
    validate::max_chars("estado", estado, ESTADO_MAX)?;
    validate::optional_web_url("sitio_web", sitio_web)?;
    validate::optional_web_url("repositorio", repositorio)
}

pub type ProjectService = CacheableService<Projects>;

impl CacheableService<Projects> {
    pub async fn themes(
        &self,
        project_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<ThemeRecord>> {
        self.get_related_entities(project_id, TABLE, themes::TABLE, PROJECT_THEMES, options)
            .await
    }

    pub async fn authors(
        &self,
        project_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<PersonRecord>> {
        self.get_related_entities(project_id, TABLE, people::TABLE, PROJECT_AUTHORS, options)
            .await
    }

    pub async fn organizations(
        &self,
        project_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<OrganizationRecord>> {
        self.get_related_entities(
            project_id,
            TABLE,
            organizations::TABLE,
            ORGANIZATION_PROJECTS,
            options,
        )
        .await
    }

    pub async fn add_theme(&self, project_id: &str, theme_id: &str) -> ServiceResult<bool> {
        self.link_related(project_id, TABLE, themes::TABLE, PROJECT_THEMES, theme_id)
            .await
    }

    pub async fn remove_theme(&self, project_id: &str, theme_id: &str) -> ServiceResult<bool> {
        self.unlink_related(project_id, TABLE, themes::TABLE, PROJECT_THEMES, theme_id)
            .await
    }

    pub async fn add_author(&self, project_id: &str, person_id: &str) -> ServiceResult<bool> {
        self.link_related(project_id, TABLE, people::TABLE, PROJECT_AUTHORS, person_id)
            .await
    }

    pub async fn remove_author(&self, project_id: &str, person_id: &str) -> ServiceResult<bool> {
        self.unlink_related(project_id, TABLE, people::TABLE, PROJECT_AUTHORS, person_id)
            .await
    }
}
