//! Repository traits describing persistence adapters.
//!
//! The service layer talks to storage through [`EntityStore`]: table-scoped
//! reads and writes over JSON-object rows plus a junction-table read path.
//! Table and column names are plain strings; adapters must treat them as
//! identifiers (validated and quoted), never as SQL text.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::query::{SortOrder, ensure_identifier};
use crate::domain::error::DomainError;

/// A stored row as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    IsNull { column: String },
}

impl Filter {
    pub fn from_value(column: &str, value: &Value) -> Self {
        let column = column.to_string();
        match value {
            Value::Null => Filter::IsNull { column },
            Value::Array(values) => Filter::In {
                column,
                values: values.clone(),
            },
            other => Filter::Eq {
                column,
                value: other.clone(),
            },
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } | Filter::IsNull { column } => {
                column
            }
        }
    }
}

/// Case-insensitive substring match of `term` against any of `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub term: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub text: Option<TextMatch>,
    pub sort: Option<SortKey>,
    pub range: Option<Range>,
}

/// A many-to-many edge stored in a junction table.
///
/// Junction columns default to `<source_table>_id` and `<target_table>_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub source_table: String,
    pub target_table: String,
    pub junction_table: String,
    pub source_column: String,
    pub target_column: String,
}

impl Relation {
    pub fn new(source_table: &str, target_table: &str, junction_table: &str) -> Result<Self, DomainError> {
        Self::with_columns(
            source_table,
            target_table,
            junction_table,
            &format!("{source_table}_id"),
            &format!("{target_table}_id"),
        )
    }

    pub fn with_columns(
        source_table: &str,
        target_table: &str,
        junction_table: &str,
        source_column: &str,
        target_column: &str,
    ) -> Result<Self, DomainError> {
        ensure_identifier("source_table", source_table)?;
        ensure_identifier("target_table", target_table)?;
        ensure_identifier("junction_table", junction_table)?;
        ensure_identifier("source_column", source_column)?;
        ensure_identifier("target_column", target_column)?;

        Ok(Self {
            source_table: source_table.to_string(),
            target_table: target_table.to_string(),
            junction_table: junction_table.to_string(),
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
        })
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Row>, RepoError>;

    /// One batched read; ids that do not exist are simply absent from the result.
    async fn find_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, RepoError>;

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, RepoError>;

    /// Insert `values` and return the stored row, generated columns included.
    async fn insert(&self, table: &str, values: Row) -> Result<Row, RepoError>;

    /// Apply a partial update; `None` when no row has `id`.
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Option<Row>, RepoError>;

    /// Remove the row; `false` when no row has `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<bool, RepoError>;

    /// Rows of `relation.target_table` joined through the junction table to `source_id`.
    async fn select_related(
        &self,
        relation: &Relation,
        source_id: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, RepoError>;

    /// Insert a junction row; `false` when the pair already exists.
    async fn link(&self, relation: &Relation, source_id: &str, target_id: &str) -> Result<bool, RepoError>;

    /// Remove a junction row; `false` when the pair did not exist.
    async fn unlink(&self, relation: &Relation, source_id: &str, target_id: &str) -> Result<bool, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_derives_junction_columns_from_tables() {
        let relation = Relation::new("organizacion", "tema", "organizacion_tema").expect("valid");
        assert_eq!(relation.source_column, "organizacion_id");
        assert_eq!(relation.target_column, "tema_id");
    }

    #[test]
    fn relation_rejects_non_identifiers() {
        let err = Relation::new("organizacion", "tema; --", "organizacion_tema").expect_err("bad");
        assert_eq!(err.field(), Some("target_table"));
    }
}
