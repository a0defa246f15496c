//! Per-entity configuration consumed by the generic services.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::application::repos::{RepoError, Row};
use crate::domain::entities::Entity;
use crate::domain::error::DomainError;

/// Everything a concrete service supplies to the generic CRUD and cache layers.
pub trait EntityDefinition: Send + Sync + 'static {
    type Entity: Entity;
    /// Insert payload. `None` fields should be skipped so column defaults apply.
    type Create: Serialize + Send + Sync;
    /// Partial update payload. Only serialized fields are written.
    type Update: Serialize + Send + Sync;

    const TABLE: &'static str;
    const SEARCHABLE_FIELDS: &'static [&'static str];
    /// Whether rows carry the `is_deleted`/`deleted_by`/`deleted_at` columns.
    const SOFT_DELETE: bool = false;
    /// Overrides the configured default TTL.
    const CACHE_TTL: Option<Duration> = None;

    fn validate_create(input: &Self::Create) -> Result<(), DomainError>;

    fn validate_update(input: &Self::Update) -> Result<(), DomainError>;
}

pub(crate) fn searchable_fields<D: EntityDefinition>() -> Vec<String> {
    D::SEARCHABLE_FIELDS
        .iter()
        .map(|field| (*field).to_string())
        .collect()
}

/// Serialize a DTO into the column map handed to storage.
pub(crate) fn to_row<T: Serialize>(input: &T) -> Result<Row, RepoError> {
    match serde_json::to_value(input) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(RepoError::invalid_input(format!(
            "expected an object of columns, got `{other}`"
        ))),
        Err(err) => Err(RepoError::invalid_input(err.to_string())),
    }
}

pub(crate) fn decode_row<E: Entity>(row: Row) -> Result<E, RepoError> {
    serde_json::from_value(Value::Object(row)).map_err(|err| RepoError::Decode(err.to_string()))
}

pub(crate) fn decode_rows<E: Entity>(rows: Vec<Row>) -> Result<Vec<E>, RepoError> {
    rows.into_iter().map(decode_row).collect()
}
