//! People who author projects.

use serde::{Deserialize, Serialize};

use crate::application::query::QueryOptions;
use crate::application::result::ServiceResult;
use crate::application::service::{CacheableService, EntityDefinition};
use crate::domain::entities::{PersonRecord, ProjectRecord};
use crate::domain::error::DomainError;
use crate::domain::validate;

use super::{PROJECT_AUTHORS, patch, projects};

pub const TABLE: &str = "persona";

const NOMBRE_MAX: usize = 120;
const BIOGRAFIA_MAX: usize = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePerson {
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apellido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biografia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfil_url: Option<String>,
}

/// `None` leaves a column unchanged; `Some(None)` sets it to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub apellido: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub biografia: Option<Option<String>>,
    #[serde(
        deserialize_with = "patch::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub perfil_url: Option<Option<String>>,
}

pub struct People;

impl EntityDefinition for People {
    type Entity = PersonRecord;
    type Create = CreatePerson;
    type Update = UpdatePerson;

    const TABLE: &'static str = TABLE;
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["nombre", "apellido", "biografia"];
    const SOFT_DELETE: bool = true;

    fn validate_create(input: &CreatePerson) -> Result<(), DomainError> {
        validate::required("nombre", &input.nombre)?;
        validate::max_chars("nombre", Some(&input.nombre), NOMBRE_MAX)?;
        validate::max_chars("apellido", input.apellido.as_deref(), NOMBRE_MAX)?;
        validate::max_chars("biografia", input.biografia.as_deref(), BIOGRAFIA_MAX)?;
        validate::optional_email("email", input.email.as_deref())?;
        validate::optional_web_url("perfil_url", input.perfil_url.as_deref())
    }

    fn validate_update(input: &UpdatePerson) -> Result<(), DomainError> {
        validate::required_if_present("nombre", input.nombre.as_deref())?;
        validate::max_chars("nombre", input.nombre.as_deref(), NOMBRE_MAX)?;
        validate::max_chars("apellido", patch::value(&input.apellido), NOMBRE_MAX)?;
        validate::max_chars("biografia", patch::value(&input.biografia), BIOGRAFIA_MAX)?;
        validate::optional_email("email", patch::value(&input.email))?;
        validate::optional_web_url("perfil_url", patch::value(&input.perfil_url))
    }
}

pub type PersonService = CacheableService<People>;

impl CacheableService<People> {
    pub async fn projects(
        &self,
        person_id: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<ProjectRecord>> {
        self.get_related_entities(person_id, TABLE, projects::TABLE, PROJECT_AUTHORS, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_and_email_are_checked() {
        let err = People::validate_create(&CreatePerson {
            nombre: "Ana".into(),
            perfil_url: Some("mailto:ana@example.org".into()),
            ..Default::default()
        })
        .expect_err("not http");
        assert_eq!(err.field(), Some("perfil_url"));

        let err = People::validate_update(&UpdatePerson {
            email: Some(Some("ana@".into())),
            ..Default::default()
        })
        .expect_err("incomplete");
        assert_eq!(err.field(), Some("email"));
    }
}
