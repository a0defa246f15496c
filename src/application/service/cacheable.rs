//! Read-through caching and junction-table relations on top of [`BaseService`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::application::query::{ListOptions, QueryOptions, SearchOptions};
use crate::application::repos::{EntityStore, Relation};
use crate::application::result::ServiceResult;
use crate::cache::{CacheAdapter, CacheKey, FillToken};
use crate::domain::entities::Entity;

use super::base::{BaseService, ensure_id, ensure_ids, invalid, storage};
use super::definition::{EntityDefinition, decode_rows};

/// [`BaseService`] with a read-through entity cache.
///
/// Reads by id consult the cache first and populate it on a miss, unless the
/// key was invalidated while the miss was being read. Every
/// successful write invalidates `table:id` after storage has accepted it; a
/// failed write leaves the cache as it was. Listings and search always go to
/// storage.
pub struct CacheableService<D: EntityDefinition> {
    base: BaseService<D>,
    cache: Arc<dyn CacheAdapter>,
    ttl: Duration,
}

impl<D: EntityDefinition> Clone for CacheableService<D> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }
}

impl<D: EntityDefinition> CacheableService<D> {
    /// `default_ttl` applies unless the definition declares its own.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheAdapter>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            base: BaseService::new(store),
            cache,
            ttl: D::CACHE_TTL.unwrap_or(default_ttl),
        }
    }

    pub fn base(&self) -> &BaseService<D> {
        &self.base
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(id: &str) -> CacheKey {
        CacheKey::new(D::TABLE, id)
    }

    async fn cached(&self, key: &CacheKey) -> Option<D::Entity> {
        let value = self.cache.get(key).await?;
        match serde_json::from_value(value) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!(key = %key, error = %err, "cached value no longer decodes; dropping it");
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    async fn remember(&self, entity: &D::Entity, token: FillToken) {
        match serde_json::to_value(entity) {
            Ok(value) => {
                self.cache
                    .fill(Self::key(entity.id()), value, self.ttl, token)
                    .await;
            }
            Err(err) => warn!(id = %entity.id(), error = %err, "entity not cacheable"),
        }
    }

    async fn forget(&self, id: &str) {
        self.cache.invalidate(&Self::key(id)).await;
    }

    pub async fn create(&self, input: D::Create) -> ServiceResult<D::Entity> {
        self.base.create(input).await
    }

    #[instrument(skip_all, fields(entity = D::TABLE, id = %id, cache = tracing::field::Empty))]
    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<D::Entity>> {
        ensure_id(id).map_err(invalid::<D>("get_by_id"))?;

        let key = Self::key(id);
        if let Some(entity) = self.cached(&key).await {
            tracing::Span::current().record("cache", "hit");
            return Ok(Some(entity));
        }
        tracing::Span::current().record("cache", "miss");

        let token = self.cache.fill_token(&key).await;
        let fetched = self.base.get_by_id(id).await?;
        if let Some(entity) = fetched.as_ref() {
            self.remember(entity, token).await;
        }
        Ok(fetched)
    }

    /// Cached entities plus one batched storage read for the rest.
    ///
    /// The result is not in request order. A blank id is a
    /// `VALIDATION_ERROR`; duplicates are read once.
    #[instrument(skip_all, fields(entity = D::TABLE, requested = ids.len()))]
    pub async fn get_by_ids(&self, ids: &[String]) -> ServiceResult<Vec<D::Entity>> {
        ensure_ids(ids).map_err(invalid::<D>("get_by_ids"))?;

        let mut seen = HashSet::new();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        let mut tokens = HashMap::new();

        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let key = Self::key(id);
            match self.cached(&key).await {
                Some(entity) => found.push(entity),
                None => {
                    tokens.insert(id.clone(), self.cache.fill_token(&key).await);
                    missing.push(id.clone());
                }
            }
        }
        debug!(hits = found.len(), misses = missing.len(), "batched cache lookup");

        if !missing.is_empty() {
            let fetched = self.base.get_by_ids(&missing).await?;
            for entity in &fetched {
                if let Some(&token) = tokens.get(entity.id()) {
                    self.remember(entity, token).await;
                }
            }
            found.extend(fetched);
        }
        Ok(found)
    }

    pub async fn get_all(&self, options: &ListOptions) -> ServiceResult<Vec<D::Entity>> {
        self.base.get_all(options).await
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<D::Entity>> {
        self.base.search(query, options).await
    }

    pub async fn update(&self, id: &str, patch: D::Update) -> ServiceResult<D::Entity> {
        let updated = self.base.update(id, patch).await?;
        self.forget(id).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.base.delete(id).await?;
        self.forget(id).await;
        Ok(())
    }

    pub async fn soft_delete(&self, id: &str, deleted_by: &str) -> ServiceResult<D::Entity> {
        let deleted = self.base.soft_delete(id, deleted_by).await?;
        self.forget(id).await;
        Ok(deleted)
    }

    pub async fn restore(&self, id: &str) -> ServiceResult<D::Entity> {
        let restored = self.base.restore(id).await?;
        self.forget(id).await;
        Ok(restored)
    }

    /// Rows of `target_table` linked to `id` through `junction_table`.
    ///
    /// The junction is matched on `<source_table>_id = id` and joined on
    /// `<target_table>_id`. Filters, sort and paging in `options` apply to
    /// the target rows. Results are not cached.
    #[instrument(
        skip_all,
        fields(entity = D::TABLE, id = %id, target = target_table, junction = junction_table)
    )]
    pub async fn get_related_entities<R: Entity>(
        &self,
        id: &str,
        source_table: &str,
        target_table: &str,
        junction_table: &str,
        options: &QueryOptions,
    ) -> ServiceResult<Vec<R>> {
        ensure_id(id).map_err(invalid::<D>("get_related_entities"))?;
        let relation = Relation::new(source_table, target_table, junction_table)
            .map_err(invalid::<D>("get_related_entities"))?;
        let select = options
            .to_select()
            .map_err(invalid::<D>("get_related_entities"))?;

        let rows = self
            .base
            .store()
            .select_related(&relation, id, &select)
            .await
            .map_err(storage::<D>("get_related_entities"))?;
        decode_rows(rows).map_err(storage::<D>("get_related_entities"))
    }

    /// Insert the junction row `(id, target_id)`. `Ok(false)` if it already existed.
    #[instrument(
        skip_all,
        fields(entity = D::TABLE, id = %id, target_id = %target_id, junction = junction_table)
    )]
    pub async fn link_related(
        &self,
        id: &str,
        source_table: &str,
        target_table: &str,
        junction_table: &str,
        target_id: &str,
    ) -> ServiceResult<bool> {
        let relation = junction::<D>(
            "link_related",
            id,
            source_table,
            target_table,
            junction_table,
            target_id,
        )?;
        self.base
            .store()
            .link(&relation, id, target_id)
            .await
            .map_err(storage::<D>("link_related"))
    }

    /// Remove the junction row `(id, target_id)`. `Ok(false)` if it did not exist.
    #[instrument(
        skip_all,
        fields(entity = D::TABLE, id = %id, target_id = %target_id, junction = junction_table)
    )]
    pub async fn unlink_related(
        &self,
        id: &str,
        source_table: &str,
        target_table: &str,
        junction_table: &str,
        target_id: &str,
    ) -> ServiceResult<bool> {
        let relation = junction::<D>(
            "unlink_related",
            id,
            source_table,
            target_table,
            junction_table,
            target_id,
        )?;
        self.base
            .store()
            .unlink(&relation, id, target_id)
            .await
            .map_err(storage::<D>("unlink_related"))
    }
}

fn junction<D: EntityDefinition>(
    operation: &'static str,
    id: &str,
    source_table: &str,
    target_table: &str,
    junction_table: &str,
    target_id: &str,
) -> ServiceResult<Relation> {
    ensure_id(id).map_err(invalid::<D>(operation))?;
    ensure_id(target_id).map_err(invalid::<D>(operation))?;
    Relation::new(source_table, target_table, junction_table).map_err(invalid::<D>(operation))
}
