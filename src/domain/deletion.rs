//! Soft-delete state shared by every entity that supports logical deletion.
//!
//! Storage keeps three flat columns (`is_deleted`, `deleted_by`, `deleted_at`);
//! the domain sees a two-state variant so that "restore clears exactly these
//! three fields" lives here and nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const IS_DELETED_COLUMN: &str = "is_deleted";
pub const DELETED_BY_COLUMN: &str = "deleted_by";
pub const DELETED_AT_COLUMN: &str = "deleted_at";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "SoftDeleteColumns", into = "SoftDeleteColumns")]
pub enum DeletionState {
    #[default]
    Active,
    Deleted {
        by: Option<String>,
        at: Option<OffsetDateTime>,
    },
}

impl DeletionState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    /// Column values that move a row into the deleted state.
    pub fn deleted_patch(by: &str, at: OffsetDateTime) -> Map<String, Value> {
        SoftDeleteColumns::from(DeletionState::Deleted {
            by: Some(by.to_string()),
            at: Some(at),
        })
        .into_patch()
    }

    /// Column values that bring a row back to the active state.
    pub fn restored_patch() -> Map<String, Value> {
        SoftDeleteColumns::from(DeletionState::Active).into_patch()
    }
}

/// Flat storage representation of [`DeletionState`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SoftDeleteColumns {
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    deleted_by: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    deleted_at: Option<OffsetDateTime>,
}

impl SoftDeleteColumns {
    fn into_patch(self) -> Map<String, Value> {
        let deleted_at = self
            .deleted_at
            .and_then(|at| at.format(&Rfc3339).ok())
            .map_or(Value::Null, Value::String);

        let mut patch = Map::new();
        patch.insert(IS_DELETED_COLUMN.to_string(), Value::Bool(self.is_deleted));
        patch.insert(
            DELETED_BY_COLUMN.to_string(),
            self.deleted_by.map_or(Value::Null, Value::String),
        );
        patch.insert(DELETED_AT_COLUMN.to_string(), deleted_at);
        patch
    }
}

impl From<SoftDeleteColumns> for DeletionState {
    fn from(columns: SoftDeleteColumns) -> Self {
        if columns.is_deleted {
            Self::Deleted {
                by: columns.deleted_by,
                at: columns.deleted_at,
            }
        } else {
            Self::Active
        }
    }
}

impl From<DeletionState> for SoftDeleteColumns {
    fn from(state: DeletionState) -> Self {
        match state {
            DeletionState::Active => Self::default(),
            DeletionState::Deleted { by, at } => Self {
                is_deleted: true,
                deleted_by: by,
                deleted_at: at,
            },
        }
    }
}
