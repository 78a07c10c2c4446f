//! Category label and membership resolution.
//!
//! Category records live apart from entity records upstream. Callers often
//! hold only an entity id, so label resolution falls back from "treat the id
//! as a category" to "look the entity up and follow its category reference".
//! Both labels and member sets are near-static and cached per id; an empty
//! label or member set is a valid cached answer, not a miss.

use crate::cache::{CacheKey, TtlCache};
use crate::fanout::MAX_IN_FLIGHT;
use crate::index::walk_listing;
use crate::model::CategorySummary;
use crate::upstream::{CategoryRecord, NamedResource, Resource, Upstream, cancellable};
use crate::{CatalogConfig, CatalogError, Result};
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CategoryResolver {
    upstream: Arc<dyn Upstream>,
    labels: TtlCache<Arc<str>>,
    members: TtlCache<Arc<[u32]>>,
    list: TtlCache<Arc<[CategorySummary]>>,
    config: Arc<CatalogConfig>,
}

impl CategoryResolver {
    pub fn new(upstream: Arc<dyn Upstream>, config: Arc<CatalogConfig>) -> Self {
        Self {
            upstream,
            labels: TtlCache::new(),
            members: TtlCache::new(),
            list: TtlCache::new(),
            config,
        }
    }

    /// Display label for a category id, or for an entity id whose category
    /// has to be discovered first. Empty when neither lookup yields a label.
    ///
    /// Only "not found" outcomes are cached as empty; transient upstream
    /// failures are returned without touching the cache.
    pub async fn label(&self, id: u32, cancel: &CancellationToken) -> Result<Arc<str>> {
        self.labels
            .get_or_try_insert_with(CacheKey::CategoryLabel(id), self.config.label_ttl, || {
                self.resolve_label(id, cancel)
            })
            .await
    }

    /// Ascending, deduplicated ids of the entities in a category. Empty when
    /// the category does not exist or lists no variants.
    pub async fn members(&self, category_id: u32, cancel: &CancellationToken) -> Result<Arc<[u32]>> {
        let key = CacheKey::CategoryMembers(category_id);
        self.members
            .get_or_try_insert_with(key, self.config.members_ttl, || async {
                let record = match cancellable(cancel, self.upstream.category(category_id)).await {
                    Ok(record) => record,
                    Err(e) if e.is_not_found() => {
                        debug!(category_id, "Unknown category, caching empty membership");
                        return Ok(Vec::<u32>::new().into());
                    }
                    Err(e) => return Err(e),
                };

                let mut ids: Vec<u32> = record
                    .variants
                    .iter()
                    .filter_map(|variant| variant.entity_ref.as_ref().and_then(NamedResource::id))
                    .collect();
                ids.sort_unstable();
                ids.dedup();

                Ok(ids.into())
            })
            .await
    }

    /// Every category with a non-empty label, one entry per distinct label.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Arc<[CategorySummary]>> {
        self.list
            .get_or_try_insert_with(CacheKey::CategoryList, self.config.categories_ttl, || {
                self.build_list(cancel)
            })
            .await
    }

    async fn build_list(&self, cancel: &CancellationToken) -> Result<Arc<[CategorySummary]>> {
        let rows = walk_listing(
            self.upstream.as_ref(),
            Resource::Category,
            self.config.listing_page_size,
            cancel,
        )
        .await?;

        let mut ids: Vec<u32> = rows.into_iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids.dedup();

        // A transient failure aborts the build so that a partial list is
        // never cached.
        let labelled: Vec<(u32, Arc<str>)> = stream::iter(ids)
            .map(|id| async move { Ok::<_, CatalogError>((id, self.label(id, cancel).await?)) })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        let list = dedupe_by_label(labelled);
        info!(categories = list.len(), "Category list built");
        Ok(list.into())
    }

    async fn resolve_label(&self, id: u32, cancel: &CancellationToken) -> Result<Arc<str>> {
        if let Some(label) = self.direct_label(id, cancel).await? {
            return Ok(label.into());
        }

        let entity = match cancellable(cancel, self.upstream.entity(id)).await {
            Ok(entity) => entity,
            Err(e) if e.is_not_found() => {
                debug!(id, "Neither a category nor an entity, caching empty label");
                return Ok(Arc::from(""));
            }
            Err(e) => return Err(e),
        };

        let Some(category_id) = entity.category_ref.as_ref().and_then(NamedResource::id) else {
            debug!(id, "Entity has no category reference");
            return Ok(Arc::from(""));
        };

        match self.direct_label(category_id, cancel).await? {
            Some(label) => {
                let label: Arc<str> = label.into();
                self.labels.insert(
                    CacheKey::CategoryLabel(category_id),
                    label.clone(),
                    self.config.label_ttl,
                );
                Ok(label)
            }
            None => Ok(Arc::from("")),
        }
    }

    /// Label of `category_id` read from its own record; `None` when the
    /// record is missing or carries nothing usable.
    async fn direct_label(
        &self,
        category_id: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        match cancellable(cancel, self.upstream.category(category_id)).await {
            Ok(record) => Ok(self.pick_label(&record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn pick_label(&self, record: &CategoryRecord) -> Option<String> {
        record
            .label_for(&self.config.primary_locale)
            .or_else(|| record.label_for(&self.config.fallback_locale))
            .or_else(|| Some(record.name.trim()).filter(|slug| !slug.is_empty()))
            .map(str::to_string)
    }
}

/// Drops empty labels, keeps the lowest id for labels that compare equal
/// ignoring case and surrounding whitespace, and orders by label.
fn dedupe_by_label(mut labelled: Vec<(u32, Arc<str>)>) -> Vec<CategorySummary> {
    labelled.sort_unstable_by_key(|(id, _)| *id);

    let mut seen = HashSet::new();
    let mut list: Vec<CategorySummary> = labelled
        .into_iter()
        .filter_map(|(id, label)| {
            let name = label.trim();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                return None;
            }
            Some(CategorySummary {
                id,
                name: name.to_string(),
            })
        })
        .collect();

    list.sort_by_cached_key(|c| (c.name.to_lowercase(), c.id));
    list
}
