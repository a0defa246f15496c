use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder, types::Json};

use crate::application::query::is_identifier;
use crate::application::repos::{
    EntityStore, Filter, ID_COLUMN, Relation, RepoError, Row, SelectQuery,
};

use super::{PostgresStore, map_sqlx_error};

type Sql = QueryBuilder<'static, Postgres>;

const ROW_ALIAS: &str = "r";
const JUNCTION_ALIAS: &str = "j";

#[async_trait]
impl EntityStore for PostgresStore {
    async fn find_by_id(&self, table: &str, id: &str) -> Result<Option<Row>, RepoError> {
        let mut qb = select_from(table)?;
        qb.push(" AND ");
        push_column(&mut qb, ROW_ALIAS, ID_COLUMN)?;
        qb.push(" = ");
        qb.push_bind(id.to_string());

        let value = qb
            .build_query_scalar::<Value>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        value.map(into_row).transpose()
    }

    async fn find_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<Row>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = select_from(table)?;
        qb.push(" AND ");
        push_column(&mut qb, ROW_ALIAS, ID_COLUMN)?;
        qb.push(" = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(")");

        fetch_rows(self, qb).await
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, RepoError> {
        let qb = select_sql(table, query)?;
        fetch_rows(self, qb).await
    }

    async fn insert(&self, table: &str, values: Row) -> Result<Row, RepoError> {
        let mut qb = insert_sql(table, values)?;
        let value = qb
            .build_query_scalar::<Value>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_row(value)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Option<Row>, RepoError> {
        let mut qb = update_sql(table, id, patch)?;
        let value = qb
            .build_query_scalar::<Value>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        value.map(into_row).transpose()
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, RepoError> {
        let mut qb = Sql::new("DELETE FROM ");
        push_ident(&mut qb, table)?;
        qb.push(" WHERE ");
        push_ident(&mut qb, ID_COLUMN)?;
        qb.push(" = ");
        qb.push_bind(id.to_string());

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn select_related(
        &self,
        relation: &Relation,
        source_id: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, RepoError> {
        let qb = related_sql(relation, source_id, query)?;
        fetch_rows(self, qb).await
    }

    async fn link(
        &self,
        relation: &Relation,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, RepoError> {
        let mut qb = link_sql(relation, source_id, target_id)?;
        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlink(
        &self,
        relation: &Relation,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, RepoError> {
        let mut qb = Sql::new("DELETE FROM ");
        push_ident(&mut qb, &relation.junction_table)?;
        qb.push(" WHERE ");
        push_ident(&mut qb, &relation.source_column)?;
        qb.push(" = ");
        qb.push_bind(source_id.to_string());
        qb.push(" AND ");
        push_ident(&mut qb, &relation.target_column)?;
        qb.push(" = ");
        qb.push_bind(target_id.to_string());

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

async fn fetch_rows(store: &PostgresStore, mut qb: Sql) -> Result<Vec<Row>, RepoError> {
    let values = qb
        .build_query_scalar::<Value>()
        .fetch_all(store.pool())
        .await
        .map_err(map_sqlx_error)?;
    values.into_iter().map(into_row).collect()
}

fn into_row(value: Value) -> Result<Row, RepoError> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(RepoError::Decode(format!(
            "expected a JSON object row, got `{other}`"
        ))),
    }
}

/// Push `"name"`; anything that is not a plain identifier is refused.
fn push_ident(qb: &mut Sql, name: &str) -> Result<(), RepoError> {
    if !is_identifier(name) {
        return Err(RepoError::invalid_input(format!(
            "`{name}` is not a valid table or column name"
        )));
    }
    qb.push(format!("\"{name}\""));
    Ok(())
}

fn push_column(qb: &mut Sql, alias: &str, column: &str) -> Result<(), RepoError> {
    qb.push(alias);
    qb.push(".");
    push_ident(qb, column)
}

fn push_ident_list(qb: &mut Sql, names: &[String]) -> Result<(), RepoError> {
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            qb.push(", ");
        }
        push_ident(qb, name)?;
    }
    Ok(())
}

fn select_from(table: &str) -> Result<Sql, RepoError> {
    let mut qb = Sql::new("SELECT to_jsonb(r) AS row FROM ");
    push_ident(&mut qb, table)?;
    qb.push(" AS r WHERE TRUE");
    Ok(qb)
}

pub(super) fn select_sql(table: &str, query: &SelectQuery) -> Result<Sql, RepoError> {
    let mut qb = select_from(table)?;
    push_conditions(&mut qb, query)?;
    push_order_and_range(&mut qb, query)?;
    Ok(qb)
}

pub(super) fn related_sql(
    relation: &Relation,
    source_id: &str,
    query: &SelectQuery,
) -> Result<Sql, RepoError> {
    let mut qb = Sql::new("SELECT to_jsonb(r) AS row FROM ");
    push_ident(&mut qb, &relation.target_table)?;
    qb.push(" AS r JOIN ");
    push_ident(&mut qb, &relation.junction_table)?;
    qb.push(" AS j ON ");
    push_column(&mut qb, JUNCTION_ALIAS, &relation.target_column)?;
    qb.push(" = ");
    push_column(&mut qb, ROW_ALIAS, ID_COLUMN)?;
    qb.push(" WHERE ");
    push_column(&mut qb, JUNCTION_ALIAS, &relation.source_column)?;
    qb.push(" = ");
    qb.push_bind(source_id.to_string());

    push_conditions(&mut qb, query)?;
    push_order_and_range(&mut qb, query)?;
    Ok(qb)
}

/// Columns present in `values` are written; the rest take their defaults.
pub(super) fn insert_sql(table: &str, values: Row) -> Result<Sql, RepoError> {
    let mut qb = Sql::new("INSERT INTO ");
    push_ident(&mut qb, table)?;
    qb.push(" AS r");

    if values.is_empty() {
        qb.push(" DEFAULT VALUES");
    } else {
        let columns: Vec<String> = values.keys().cloned().collect();
        qb.push(" (");
        push_ident_list(&mut qb, &columns)?;
        qb.push(") SELECT ");
        push_ident_list(&mut qb, &columns)?;
        qb.push(" FROM jsonb_populate_record(NULL::");
        push_ident(&mut qb, table)?;
        qb.push(", ");
        qb.push_bind(Json(Value::Object(values)));
        qb.push("::jsonb)");
    }

    qb.push(" RETURNING to_jsonb(r)");
    Ok(qb)
}

pub(super) fn update_sql(table: &str, id: &str, patch: Row) -> Result<Sql, RepoError> {
    if patch.is_empty() {
        return Err(RepoError::invalid_input("update contains no columns"));
    }
    let columns: Vec<String> = patch.keys().cloned().collect();

    let mut qb = Sql::new("UPDATE ");
    push_ident(&mut qb, table)?;
    qb.push(" AS r SET (");
    push_ident_list(&mut qb, &columns)?;
    qb.push(") = (SELECT ");
    push_ident_list(&mut qb, &columns)?;
    qb.push(" FROM jsonb_populate_record(NULL::");
    push_ident(&mut qb, table)?;
    qb.push(", ");
    qb.push_bind(Json(Value::Object(patch)));
    qb.push("::jsonb)) WHERE ");
    push_column(&mut qb, ROW_ALIAS, ID_COLUMN)?;
    qb.push(" = ");
    qb.push_bind(id.to_string());
    qb.push(" RETURNING to_jsonb(r)");
    Ok(qb)
}

pub(super) fn link_sql(relation: &Relation, source_id: &str, target_id: &str) -> Result<Sql, RepoError> {
    let mut qb = Sql::new("INSERT INTO ");
    push_ident(&mut qb, &relation.junction_table)?;
    qb.push(" (");
    push_ident(&mut qb, &relation.source_column)?;
    qb.push(", ");
    push_ident(&mut qb, &relation.target_column)?;
    qb.push(") VALUES (");
    qb.push_bind(source_id.to_string());
    qb.push(", ");
    qb.push_bind(target_id.to_string());
    qb.push(") ON CONFLICT DO NOTHING");
    Ok(qb)
}

/// Filters compare `to_jsonb(column)` with a bound JSON value so one code
/// path serves every column type.
fn push_conditions(qb: &mut Sql, query: &SelectQuery) -> Result<(), RepoError> {
    for filter in &query.filters {
        qb.push(" AND ");
        match filter {
            Filter::Eq { column, value } => {
                qb.push("to_jsonb(");
                push_column(qb, ROW_ALIAS, column)?;
                qb.push(") = ");
                qb.push_bind(Json(value.clone()));
                qb.push("::jsonb");
            }
            Filter::In { column, values } => {
                qb.push("to_jsonb(");
                push_column(qb, ROW_ALIAS, column)?;
                qb.push(") IN (SELECT jsonb_array_elements(");
                qb.push_bind(Json(Value::Array(values.clone())));
                qb.push("::jsonb))");
            }
            Filter::IsNull { column } => {
                push_column(qb, ROW_ALIAS, column)?;
                qb.push(" IS NULL");
            }
        }
    }

    if let Some(text) = query.text.as_ref() {
        if text.columns.is_empty() {
            qb.push(" AND FALSE");
            return Ok(());
        }
        let pattern = like_pattern(&text.term);
        qb.push(" AND (");
        for (index, column) in text.columns.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            push_column(qb, ROW_ALIAS, column)?;
            qb.push("::text ILIKE ");
            qb.push_bind(pattern.clone());
        }
        qb.push(")");
    }
    Ok(())
}

/// Requested order first, then `id` so paging is stable.
fn push_order_and_range(qb: &mut Sql, query: &SelectQuery) -> Result<(), RepoError> {
    qb.push(" ORDER BY ");
    if let Some(sort) = query.sort.as_ref() {
        push_column(qb, ROW_ALIAS, &sort.column)?;
        qb.push(" ");
        qb.push(sort.order.as_sql());
        qb.push(", ");
    }
    push_column(qb, ROW_ALIAS, ID_COLUMN)?;
    qb.push(" ASC");

    if let Some(range) = query.range {
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(range.limit).unwrap_or(i64::MAX));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(range.offset).unwrap_or(i64::MAX));
    }
    Ok(())
}

/// `%term%` with LIKE metacharacters in `term` matched literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
