//! Caller-facing query options and their translation into storage queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::repos::{Filter, Range, SelectQuery, SortKey, TextMatch};
use crate::domain::deletion::IS_DELETED_COLUMN;
use crate::domain::error::DomainError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filtering, pagination and ordering shared by list, search and relation reads.
///
/// `filters` are equality matches on columns; a JSON `null` matches missing
/// values and an array matches any of its elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub filters: BTreeMap<String, Value>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl QueryOptions {
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn paginate(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(column.into());
        self.sort_order = Some(order);
        self
    }

    /// 1-based `page`/`page_size` to offset/limit; no paging requested means no range.
    pub fn range(&self) -> Option<Range> {
        if self.page.is_none() && self.page_size.is_none() {
            return None;
        }
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Some(Range {
            offset: u64::from(page - 1) * u64::from(page_size),
            limit: u64::from(page_size),
        })
    }

    /// Build the storage query, rejecting column names that are not plain identifiers.
    pub fn to_select(&self) -> Result<SelectQuery, DomainError> {
        let mut filters = Vec::with_capacity(self.filters.len());
        for (column, value) in &self.filters {
            ensure_identifier("filters", column)?;
            filters.push(Filter::from_value(column, value));
        }

        let sort = match self.sort_by.as_deref() {
            Some(column) => {
                ensure_identifier("sort_by", column)?;
                Some(SortKey {
                    column: column.to_string(),
                    order: self.sort_order.unwrap_or_default(),
                })
            }
            None => None,
        };

        Ok(SelectQuery {
            filters,
            text: None,
            sort,
            range: self.range(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    #[serde(flatten)]
    pub query: QueryOptions,
    pub include_deleted: bool,
}

impl ListOptions {
    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

impl From<QueryOptions> for ListOptions {
    fn from(query: QueryOptions) -> Self {
        Self {
            query,
            include_deleted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    #[serde(flatten)]
    pub query: QueryOptions,
    /// Overrides the service's declared searchable fields.
    pub searchable_fields: Option<Vec<String>>,
    pub include_deleted: bool,
}

impl SearchOptions {
    pub fn in_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Compose the storage query for a listing, hiding soft-deleted rows unless asked.
pub(crate) fn list_select(
    query: &QueryOptions,
    include_deleted: bool,
    soft_delete: bool,
) -> Result<SelectQuery, DomainError> {
    let mut select = query.to_select()?;
    if soft_delete && !include_deleted {
        select.filters.push(Filter::Eq {
            column: IS_DELETED_COLUMN.to_string(),
            value: Value::Bool(false),
        });
    }
    Ok(select)
}

/// Attach a case-insensitive substring match over `columns`.
pub(crate) fn with_text_match(
    mut select: SelectQuery,
    term: &str,
    columns: &[String],
) -> Result<SelectQuery, DomainError> {
    if columns.is_empty() {
        return Err(DomainError::validation("no searchable fields configured"));
    }
    for column in columns {
        ensure_identifier("searchable_fields", column)?;
    }
    select.text = Some(TextMatch {
        term: term.to_string(),
        columns: columns.to_vec(),
    });
    Ok(select)
}

/// Table and column names reach SQL as quoted identifiers, so only
/// `[A-Za-z_][A-Za-z0-9_]*` up to Postgres' 63-byte limit is accepted.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn ensure_identifier(field: &'static str, name: &str) -> Result<(), DomainError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(DomainError::malformed(
            field,
            format!("`{name}` is not a valid table or column name"),
        ))
    }
}
