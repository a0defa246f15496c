//! Uncached CRUD, listing and search over one table.

use std::marker::PhantomData;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::application::query::{ListOptions, SearchOptions, list_select, with_text_match};
use crate::application::repos::{EntityStore, RepoError, Row};
use crate::application::result::{ErrorCode, ServiceError, ServiceResult};
use crate::domain::deletion::DeletionState;
use crate::domain::entities::Entity;
use crate::domain::error::DomainError;

use super::definition::{EntityDefinition, decode_row, decode_rows, searchable_fields, to_row};

/// Generic CRUD for the table described by `D`.
///
/// Every operation validates its input before storage is touched, so a
/// `VALIDATION_ERROR` never follows a partial write.
pub struct BaseService<D: EntityDefinition> {
    store: Arc<dyn EntityStore>,
    _definition: PhantomData<fn() -> D>,
}

impl<D: EntityDefinition> Clone for BaseService<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _definition: PhantomData,
        }
    }
}

impl<D: EntityDefinition> BaseService<D> {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            _definition: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        D::TABLE
    }

    pub(crate) fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    #[instrument(skip_all, fields(entity = D::TABLE))]
    pub async fn create(&self, input: D::Create) -> ServiceResult<D::Entity> {
        D::validate_create(&input).map_err(invalid::<D>("create"))?;
        let row = to_row(&input).map_err(storage::<D>("create"))?;

        let stored = self
            .store
            .insert(D::TABLE, row)
            .await
            .map_err(storage::<D>("create"))?;
        let entity: D::Entity = decode_row(stored).map_err(storage::<D>("create"))?;
        debug!(id = %entity.id(), "entity created");
        Ok(entity)
    }

    #[instrument(skip_all, fields(entity = D::TABLE, id = %id))]
    pub async fn update(&self, id: &str, patch: D::Update) -> ServiceResult<D::Entity> {
        ensure_id(id).map_err(invalid::<D>("update"))?;
        D::validate_update(&patch).map_err(invalid::<D>("update"))?;
        let row = to_row(&patch).map_err(storage::<D>("update"))?;
        if row.is_empty() {
            return Err(invalid::<D>("update")(DomainError::validation(
                "update contains no fields",
            )));
        }

        self.write_patch("update", id, row).await
    }

    /// Permanently remove the row.
    #[instrument(skip_all, fields(entity = D::TABLE, id = %id))]
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        ensure_id(id).map_err(invalid::<D>("delete"))?;

        let removed = self
            .store
            .delete(D::TABLE, id)
            .await
            .map_err(storage::<D>("delete"))?;
        if removed {
            Ok(())
        } else {
            Err(invalid::<D>("delete")(DomainError::not_found(D::TABLE, id)))
        }
    }

    /// `Ok(None)` when no row has `id`; soft-deleted rows are still returned.
    #[instrument(skip_all, fields(entity = D::TABLE, id = %id))]
    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<D::Entity>> {
        ensure_id(id).map_err(invalid::<D>("get_by_id"))?;

        let row = self
            .store
            .find_by_id(D::TABLE, id)
            .await
            .map_err(storage::<D>("get_by_id"))?;
        row.map(decode_row)
            .transpose()
            .map_err(storage::<D>("get_by_id"))
    }

    /// One batched read. Missing ids are omitted and order is not preserved.
    ///
    /// A blank id anywhere in `ids` is a `VALIDATION_ERROR`, as for [`Self::get_by_id`].
    #[instrument(skip_all, fields(entity = D::TABLE, requested = ids.len()))]
    pub async fn get_by_ids(&self, ids: &[String]) -> ServiceResult<Vec<D::Entity>> {
        ensure_ids(ids).map_err(invalid::<D>("get_by_ids"))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .store
            .find_by_ids(D::TABLE, ids)
            .await
            .map_err(storage::<D>("get_by_ids"))?;
        decode_rows(rows).map_err(storage::<D>("get_by_ids"))
    }

    #[instrument(skip_all, fields(entity = D::TABLE))]
    pub async fn get_all(&self, options: &ListOptions) -> ServiceResult<Vec<D::Entity>> {
        let select = list_select(&options.query, options.include_deleted, D::SOFT_DELETE)
            .map_err(invalid::<D>("get_all"))?;

        let rows = self
            .store
            .select(D::TABLE, &select)
            .await
            .map_err(storage::<D>("get_all"))?;
        decode_rows(rows).map_err(storage::<D>("get_all"))
    }

    /// Case-insensitive substring search over the searchable fields.
    ///
    /// A blank query lists with the same options instead of matching.
    #[instrument(skip_all, fields(entity = D::TABLE, query = %query))]
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<D::Entity>> {
        let mut select = list_select(&options.query, options.include_deleted, D::SOFT_DELETE)
            .map_err(invalid::<D>("search"))?;

        let term = query.trim();
        if !term.is_empty() {
            let fields = options
                .searchable_fields
                .clone()
                .unwrap_or_else(searchable_fields::<D>);
            select = with_text_match(select, term, &fields).map_err(invalid::<D>("search"))?;
        }

        let rows = self
            .store
            .select(D::TABLE, &select)
            .await
            .map_err(storage::<D>("search"))?;
        decode_rows(rows).map_err(storage::<D>("search"))
    }

    /// Flag the row as deleted by `deleted_by`, keeping it in storage.
    #[instrument(skip_all, fields(entity = D::TABLE, id = %id))]
    pub async fn soft_delete(&self, id: &str, deleted_by: &str) -> ServiceResult<D::Entity> {
        ensure_soft_delete::<D>().map_err(invalid::<D>("soft_delete"))?;
        ensure_id(id).map_err(invalid::<D>("soft_delete"))?;

        let patch = DeletionState::deleted_patch(deleted_by, OffsetDateTime::now_utc());
        self.write_patch("soft_delete", id, patch).await
    }

    /// Clear the deletion columns. Restoring an active row is a no-op success.
    #[instrument(skip_all, fields(entity = D::TABLE, id = %id))]
    pub async fn restore(&self, id: &str) -> ServiceResult<D::Entity> {
        ensure_soft_delete::<D>().map_err(invalid::<D>("restore"))?;
        ensure_id(id).map_err(invalid::<D>("restore"))?;

        self.write_patch("restore", id, DeletionState::restored_patch())
            .await
    }

    async fn write_patch(
        &self,
        operation: &'static str,
        id: &str,
        patch: Row,
    ) -> ServiceResult<D::Entity> {
        let updated = self
            .store
            .update(D::TABLE, id, patch)
            .await
            .map_err(storage::<D>(operation))?;

        match updated {
            Some(row) => decode_row(row).map_err(storage::<D>(operation)),
            None => Err(invalid::<D>(operation)(DomainError::not_found(D::TABLE, id))),
        }
    }
}

pub(crate) fn ensure_id(id: &str) -> Result<(), DomainError> {
    if id.trim().is_empty() {
        Err(DomainError::missing("id"))
    } else {
        Ok(())
    }
}

pub(crate) fn ensure_ids(ids: &[String]) -> Result<(), DomainError> {
    ids.iter().try_for_each(|id| ensure_id(id))
}

fn ensure_soft_delete<D: EntityDefinition>() -> Result<(), DomainError> {
    if D::SOFT_DELETE {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "{} does not support soft delete",
            D::TABLE
        )))
    }
}

/// Map a validation failure for `operation`; no storage call has happened.
pub(crate) fn invalid<D: EntityDefinition>(
    operation: &'static str,
) -> impl FnOnce(DomainError) -> ServiceError {
    move |error| {
        debug!(entity = D::TABLE, operation, error = %error, "input rejected");
        ServiceError::from(error).with_origin(format!("{}.{operation}", D::TABLE))
    }
}

/// Map a storage failure for `operation`, logging anything that is not caller-fixable.
pub(crate) fn storage<D: EntityDefinition>(
    operation: &'static str,
) -> impl FnOnce(RepoError) -> ServiceError {
    move |error| {
        let mapped = ServiceError::from(error).with_origin(format!("{}.{operation}", D::TABLE));
        if mapped.code != ErrorCode::ValidationError {
            warn!(
                entity = D::TABLE,
                operation,
                code = %mapped.code,
                error = %mapped,
                "storage call failed"
            );
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::entities::organizations::{
        CreateOrganization, Organizations, UpdateOrganization,
    };
    use crate::application::entities::themes::{CreateTheme, Themes};
    use crate::application::query::QueryOptions;
    use crate::infra::memory::MemoryStore;

    fn organizations() -> (Arc<MemoryStore>, BaseService<Organizations>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BaseService::new(store))
    }

    fn named(nombre: &str) -> CreateOrganization {
        CreateOrganization {
            nombre: nombre.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_returns_row_with_generated_id() {
        let (_, service) = organizations();
        let created = service.create(named("Coop A")).await.expect("created");
        assert!(!created.id.is_empty());
        assert_eq!(created.nombre, "Coop A");
        assert!(!created.deletion.is_deleted());
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_storage() {
        let (store, service) = organizations();
        let err = service
            .create(CreateOrganization {
                nombre: "Coop A".into(),
                sitio_web: Some("not a url".into()),
                ..Default::default()
            })
            .await
            .expect_err("invalid url");

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.details, Some(json!({ "field": "sitio_web" })));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_validation_error() {
        let (_, service) = organizations();
        let err = service
            .update(
                "missing",
                UpdateOrganization {
                    nombre: Some("x".into()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("not found");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.origin.as_deref(), Some("organizacion.update"));
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let (_, service) = organizations();
        let created = service.create(named("Coop A")).await.expect("created");
        let err = service
            .update(&created.id, UpdateOrganization::default())
            .await
            .expect_err("empty patch");
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn delete_of_missing_row_is_validation_error() {
        let (_, service) = organizations();
        let err = service.delete("missing").await.expect_err("not found");
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn blank_id_is_rejected_before_storage() {
        let (store, service) = organizations();
        let err = service.get_by_id("  ").await.expect_err("blank id");
        assert!(err.is_validation());
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn storage_failure_is_db_error() {
        let (store, service) = organizations();
        store.fail_next("connection reset");
        let err = service.create(named("Coop A")).await.expect_err("db down");
        assert_eq!(err.code, ErrorCode::DbError);
        assert_eq!(err.details, Some(json!({ "cause": "connection reset" })));
    }

    #[tokio::test]
    async fn constraint_rejected_by_storage_is_db_error() {
        let (store, service) = organizations();
        store.fail_next_with(RepoError::Duplicate {
            constraint: "organizacion_nombre_key".into(),
        });
        let err = service.create(named("Coop A")).await.expect_err("duplicate");
        assert_eq!(err.code, ErrorCode::DbError);
        assert_eq!(
            err.details,
            Some(json!({ "constraint": "organizacion_nombre_key" }))
        );
        assert_eq!(err.origin.as_deref(), Some("organizacion.create"));
    }

    #[tokio::test]
    async fn unknown_sort_column_is_rejected_before_storage() {
        let (store, service) = organizations();
        let options = ListOptions::from(QueryOptions {
            sort_by: Some("nombre; drop table organizacion".into()),
            ..Default::default()
        });
        let err = service.get_all(&options).await.expect_err("bad identifier");
        assert!(err.is_validation());
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn soft_delete_requires_support() {
        let store = Arc::new(MemoryStore::new());
        let themes = BaseService::<Themes>::new(store);
        let theme = themes
            .create(CreateTheme {
                nombre: "Energía".into(),
                descripcion: None,
            })
            .await
            .expect("created");

        let err = themes
            .soft_delete(&theme.id, "admin")
            .await
            .expect_err("themes are hard-deleted only");
        assert!(err.is_validation());
    }
}
