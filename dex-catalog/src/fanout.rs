//! Bounded-concurrency detail fan-out.
//!
//! Both consumers issue one detail fetch per id with at most
//! [`MAX_IN_FLIGHT`] ids being worked on at once:
//! - page enrichment keeps the input order, whatever order fetches finish in
//! - bulk report assembly appends completions to a shared, locked sequence and
//!   sorts by id afterwards
//!
//! A failed fetch drops that id from the result. Cancellation is the only
//! per-item outcome that fails the whole operation.

use crate::category::CategoryResolver;
use crate::model::{BulkReport, EntityDetail};
use crate::upstream::{EntityRecord, NamedResource, Upstream, cancellable};
use crate::{CatalogConfig, CatalogError, Result};
use futures::{StreamExt, TryStreamExt, stream};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound on simultaneously in-flight ids per fan-out operation.
pub const MAX_IN_FLIGHT: usize = 6;

/// Resolves entity ids into [`EntityDetail`]s.
#[derive(Clone)]
pub struct Enricher {
    upstream: Arc<dyn Upstream>,
    categories: CategoryResolver,
    config: Arc<CatalogConfig>,
}

impl Enricher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        categories: CategoryResolver,
        config: Arc<CatalogConfig>,
    ) -> Self {
        Self {
            upstream,
            categories,
            config,
        }
    }

    /// Fetches one entity and resolves its category label.
    pub async fn detail(&self, id: u32, cancel: &CancellationToken) -> Result<EntityDetail> {
        let record = cancellable(cancel, self.upstream.entity(id)).await?;
        let id = if record.id == 0 { id } else { record.id };
        let category_label = self.category_label(id, &record, cancel).await?;

        Ok(EntityDetail {
            id,
            name: record.name,
            height_raw: record.height,
            weight_raw: record.weight,
            base_experience: record.base_experience.unwrap_or_default(),
            image_url: self.config.image_url(id),
            category_label,
        })
    }

    /// Details for `ids` in input order; ids whose fetch fails are left out.
    pub async fn enrich(&self, ids: &[u32], cancel: &CancellationToken) -> Result<Vec<EntityDetail>> {
        let details: Vec<Option<EntityDetail>> = stream::iter(ids.iter().copied())
            .map(|id| async move {
                match self.detail(id, cancel).await {
                    Ok(detail) => Ok(Some(detail)),
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        debug!(id, error = %e, "Dropping entity from page");
                        Ok(None)
                    }
                }
            })
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        Ok(details.into_iter().flatten().collect())
    }

    /// Deduplicates `ids`, fetches every detail and returns them sorted by id.
    pub async fn bulk_report(&self, ids: &[u32], cancel: &CancellationToken) -> Result<BulkReport> {
        let unique: BTreeSet<u32> = ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(BulkReport::default());
        }

        let collected = Mutex::new(Vec::with_capacity(unique.len()));
        stream::iter(unique)
            .for_each_concurrent(MAX_IN_FLIGHT, |id| {
                let collected = &collected;
                async move {
                    match self.detail(id, cancel).await {
                        Ok(detail) => collected.lock().push(detail),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => debug!(id, error = %e, "Leaving entity out of bulk report"),
                    }
                }
            })
            .await;

        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }

        let mut entities = collected.into_inner();
        entities.sort_by_key(|detail| detail.id);

        Ok(BulkReport {
            count: entities.len(),
            entities,
        })
    }

    /// Label through the entity's own category reference, or through the
    /// entity id when the record carries none. A transient label failure
    /// degrades to an empty label instead of dropping the entity.
    async fn category_label(
        &self,
        id: u32,
        record: &EntityRecord,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let lookup = record
            .category_ref
            .as_ref()
            .and_then(NamedResource::id)
            .unwrap_or(id);

        match self.categories.label(lookup, cancel).await {
            Ok(label) => Ok(label.to_string()),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                debug!(id, error = %e, "Category label unavailable");
                Ok(String::new())
            }
        }
    }
}
