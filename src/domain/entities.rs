//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::domain::deletion::DeletionState;

/// A row of a domain table addressable by a stable string identifier.
///
/// Everything besides `id` is opaque to the service layer; entities travel
/// through storage and cache as JSON objects and are decoded with serde.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Entities carrying the soft-delete columns.
pub trait SoftDeletable: Entity {
    fn deletion(&self) -> &DeletionState;

    fn is_deleted(&self) -> bool {
        self.deletion().is_deleted()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub sitio_web: Option<String>,
    pub email: Option<String>,
    pub localidad: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub deletion: DeletionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub sitio_web: Option<String>,
    pub repositorio: Option<String>,
    pub estado: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub deletion: DeletionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecord {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub nombre: String,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub biografia: Option<String>,
    pub perfil_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub deletion: DeletionState,
}

macro_rules! impl_entity {
    ($($record:ty),+ $(,)?) => {
        $(
            impl Entity for $record {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

macro_rules! impl_soft_deletable {
    ($($record:ty),+ $(,)?) => {
        $(
            impl SoftDeletable for $record {
                fn deletion(&self) -> &DeletionState {
                    &self.deletion
                }
            }
        )+
    };
}

impl_entity!(OrganizationRecord, ProjectRecord, ThemeRecord, PersonRecord);
impl_soft_deletable!(OrganizationRecord, ProjectRecord, PersonRecord);
