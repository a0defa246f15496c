//! In-process [`EntityStore`] for tests and database-less runs.
//!
//! Rows live in per-table ordered maps. Column defaults mirror the SQL
//! migrations: `id` (uuid v4) and `created_at` are filled on insert, and
//! tables of soft-deletable entities start rows as not deleted.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::application::entities::{Organizations, People, Projects, Themes};
use crate::application::query::{SortOrder, is_identifier};
use crate::application::repos::{
    EntityStore, Filter, ID_COLUMN, Relation, RepoError, Row, SelectQuery,
};
use crate::application::service::EntityDefinition;
use crate::domain::deletion::DeletionState;

const CREATED_AT_COLUMN: &str = "created_at";

type Table = BTreeMap<String, Row>;

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    junctions: HashMap<String, Vec<Row>>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    defaults: HashMap<String, Row>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failure: Mutex<Option<RepoError>>,
}

impl MemoryStore {
    /// Store preconfigured with the defaults of the four entity tables.
    pub fn new() -> Self {
        Self::empty()
            .register::<Organizations>()
            .register::<Projects>()
            .register::<Themes>()
            .register::<People>()
    }

    /// Store with no table defaults beyond `id` and `created_at`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Apply the column defaults `D`'s table has in the database.
    pub fn register<D: EntityDefinition>(mut self) -> Self {
        let defaults = self.defaults.entry(D::TABLE.to_string()).or_default();
        if D::SOFT_DELETE {
            defaults.extend(DeletionState::restored_patch());
        }
        self
    }

    /// Storage calls that read rows so far.
    pub fn reads(&self) -> usize {
        self.reads.load(AtomicOrdering::SeqCst)
    }

    /// Storage calls that modified rows so far, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Make the next storage call fail with a persistence error.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.fail_next_with(RepoError::Persistence(message.into()));
    }

    /// Make the next storage call fail with `error`.
    pub fn fail_next_with(&self, error: RepoError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, RepoError> {
        self.state
            .lock()
            .map_err(|_| RepoError::from_persistence("memory store lock poisoned"))
    }

    fn begin_read(&self) -> Result<(), RepoError> {
        self.reads.fetch_add(1, AtomicOrdering::SeqCst);
        self.injected_failure()
    }

    fn begin_write(&self) -> Result<(), RepoError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        self.injected_failure()
    }

    fn injected_failure(&self) -> Result<(), RepoError> {
        let pending = self
            .failure
            .lock()
            .map_err(|_| RepoError::from_persistence("memory store lock poisoned"))?
            .take();
        match pending {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Row>, RepoError> {
        ensure_identifier(table)?;
        self.begin_read()?;
        let state = self.state()?;
        Ok(state.tables.get(table).and_then(|rows| rows.get(id)).cloned())
    }

    async fn find_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, RepoError> {
        ensure_identifier(table)?;
        self.begin_read()?;
        let state = self.state()?;
        let Some(rows) = state.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, RepoError> {
        ensure_identifier(table)?;
        ensure_query_identifiers(query)?;
        self.begin_read()?;
        let state = self.state()?;
        let rows = state
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        Ok(apply_query(rows, query))
    }

    async fn insert(&self, table: &str, values: Row) -> Result<Row, RepoError> {
        ensure_identifier(table)?;
        ensure_columns(&values)?;
        self.begin_write()?;

        let mut row = self.defaults.get(table).cloned().unwrap_or_default();
        row.insert(
            ID_COLUMN.to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );
        row.insert(CREATED_AT_COLUMN.to_string(), Value::String(now_rfc3339()?));
        row.extend(values);

        let id = match row.get(ID_COLUMN) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(RepoError::invalid_input("`id` must be a non-empty string")),
        };

        let mut state = self.state()?;
        let rows = state.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(RepoError::Duplicate {
                constraint: format!("{table}_pkey"),
            });
        }
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Option<Row>, RepoError> {
        ensure_identifier(table)?;
        ensure_columns(&patch)?;
        if patch.is_empty() {
            return Err(RepoError::invalid_input("update contains no columns"));
        }
        if patch.contains_key(ID_COLUMN) {
            return Err(RepoError::invalid_input("`id` cannot be updated"));
        }
        self.begin_write()?;

        let mut state = self.state()?;
        let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
        else {
            return Ok(None);
        };
        row.extend(patch);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, RepoError> {
        ensure_identifier(table)?;
        self.begin_write()?;
        let mut state = self.state()?;
        Ok(state
            .tables
            .get_mut(table)
            .is_some_and(|rows| rows.remove(id).is_some()))
    }

    async fn select_related(
        &self,
        relation: &Relation,
        source_id: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, RepoError> {
        ensure_relation(relation)?;
        ensure_query_identifiers(query)?;
        self.begin_read()?;
        let state = self.state()?;

        let source = Value::String(source_id.to_string());
        let target_ids: HashSet<&str> = state
            .junctions
            .get(&relation.junction_table)
            .into_iter()
            .flatten()
            .filter(|link| link.get(&relation.source_column) == Some(&source))
            .filter_map(|link| link.get(&relation.target_column).and_then(Value::as_str))
            .collect();

        let rows = state
            .tables
            .get(&relation.target_table)
            .map(|rows| {
                rows.values()
                    .filter(|row| {
                        row.get(ID_COLUMN)
                            .and_then(Value::as_str)
                            .is_some_and(|id| target_ids.contains(id))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(apply_query(rows, query))
    }

    async fn link(
        &self,
        relation: &Relation,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, RepoError> {
        ensure_relation(relation)?;
        self.begin_write()?;
        let mut state = self.state()?;

        let link = junction_row(relation, source_id, target_id);
        let links = state
            .junctions
            .entry(relation.junction_table.clone())
            .or_default();
        if links.contains(&link) {
            return Ok(false);
        }
        links.push(link);
        Ok(true)
    }

    async fn unlink(
        &self,
        relation: &Relation,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, RepoError> {
        ensure_relation(relation)?;
        self.begin_write()?;
        let mut state = self.state()?;

        let link = junction_row(relation, source_id, target_id);
        let Some(links) = state.junctions.get_mut(&relation.junction_table) else {
            return Ok(false);
        };
        let before = links.len();
        links.retain(|existing| existing != &link);
        Ok(links.len() < before)
    }
}

fn junction_row(relation: &Relation, source_id: &str, target_id: &str) -> Row {
    let mut row = Map::new();
    row.insert(
        relation.source_column.clone(),
        Value::String(source_id.to_string()),
    );
    row.insert(
        relation.target_column.clone(),
        Value::String(target_id.to_string()),
    );
    row
}

fn now_rfc3339() -> Result<String, RepoError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(RepoError::from_persistence)
}

fn ensure_identifier(name: &str) -> Result<(), RepoError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(RepoError::invalid_input(format!(
            "`{name}` is not a valid table or column name"
        )))
    }
}

fn ensure_columns(row: &Row) -> Result<(), RepoError> {
    row.keys().try_for_each(|column| ensure_identifier(column))
}

fn ensure_relation(relation: &Relation) -> Result<(), RepoError> {
    ensure_identifier(&relation.source_table)?;
    ensure_identifier(&relation.target_table)?;
    ensure_identifier(&relation.junction_table)?;
    ensure_identifier(&relation.source_column)?;
    ensure_identifier(&relation.target_column)
}

fn ensure_query_identifiers(query: &SelectQuery) -> Result<(), RepoError> {
    for filter in &query.filters {
        ensure_identifier(filter.column())?;
    }
    if let Some(text) = query.text.as_ref() {
        for column in &text.columns {
            ensure_identifier(column)?;
        }
    }
    if let Some(sort) = query.sort.as_ref() {
        ensure_identifier(&sort.column)?;
    }
    Ok(())
}

/// Filter, order and page rows the way the SQL adapter does.
fn apply_query(rows: Vec<Row>, query: &SelectQuery) -> Vec<Row> {
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| query.filters.iter().all(|filter| matches_filter(row, filter)))
        .filter(|row| {
            query
                .text
                .as_ref()
                .is_none_or(|text| matches_text(row, &text.term, &text.columns))
        })
        .collect();

    rows.sort_by(|left, right| {
        let primary = query.sort.as_ref().map_or(Ordering::Equal, |sort| {
            let ordering = compare_cells(cell(left, &sort.column), cell(right, &sort.column));
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        primary.then_with(|| compare_cells(cell(left, ID_COLUMN), cell(right, ID_COLUMN)))
    });

    match query.range {
        Some(range) => rows
            .into_iter()
            .skip(usize::try_from(range.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(range.limit).unwrap_or(usize::MAX))
            .collect(),
        None => rows,
    }
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { column, value } => cell(row, column) == value,
        Filter::In { column, values } => values.contains(cell(row, column)),
        Filter::IsNull { column } => cell(row, column).is_null(),
    }
}

fn matches_text(row: &Row, term: &str, columns: &[String]) -> bool {
    let needle = term.to_lowercase();
    columns.iter().any(|column| match cell(row, column) {
        Value::Null => false,
        Value::String(text) => text.to_lowercase().contains(&needle),
        other => other.to_string().to_lowercase().contains(&needle),
    })
}

/// Postgres ordering for the value kinds rows hold; NULL sorts last ascending.
fn compare_cells(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}
