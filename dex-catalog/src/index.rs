//! Full `(id, name)` catalog index built from the upstream listing.

use crate::cache::{CacheKey, TtlCache};
use crate::model::IndexEntry;
use crate::upstream::{ListingCursor, Resource, Upstream, cancellable};
use crate::{CatalogConfig, CatalogError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Walks a listing from the first page until upstream stops returning a
/// `next` cursor, returning the rows that carry a parseable id.
pub(crate) async fn walk_listing(
    upstream: &dyn Upstream,
    resource: Resource,
    page_size: u32,
    cancel: &CancellationToken,
) -> Result<Vec<(u32, String)>> {
    let mut rows = Vec::new();
    let mut cursor = Some(ListingCursor::start(resource, page_size));
    let mut pages = 0usize;

    while let Some(current) = cursor {
        let listing = cancellable(cancel, upstream.listing(&current)).await?;
        pages += 1;

        rows.reserve(listing.results.len());
        for row in listing.results {
            match row.id() {
                Some(id) => rows.push((id, row.name)),
                None => warn!(url = %row.url, "Skipping listing row without a numeric id"),
            }
        }

        if let Some(next) = &listing.next {
            if next.offset <= current.offset {
                warn!(
                    resource = resource.label(),
                    offset = current.offset,
                    next = next.offset,
                    "Listing cursor did not advance, aborting walk"
                );
                return Err(CatalogError::Pagination {
                    resource: resource.label(),
                    reason: format!("next offset {} after offset {}", next.offset, current.offset),
                });
            }
        }
        cursor = listing.next;
    }

    info!(resource = resource.label(), pages, rows = rows.len(), "Listing walked");
    Ok(rows)
}

/// Shared, lazily built catalog index.
#[derive(Clone)]
pub struct CatalogIndex {
    upstream: Arc<dyn Upstream>,
    cache: TtlCache<Arc<[IndexEntry]>>,
    config: Arc<CatalogConfig>,
}

impl CatalogIndex {
    pub fn new(upstream: Arc<dyn Upstream>, config: Arc<CatalogConfig>) -> Self {
        Self {
            upstream,
            cache: TtlCache::new(),
            config,
        }
    }

    /// Returns the index ordered ascending by id, rebuilding it when the
    /// cached copy has expired.
    ///
    /// A failed rebuild is reported to the caller and leaves the cached copy
    /// untouched.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<Arc<[IndexEntry]>> {
        self.cache
            .get_or_try_insert_with(CacheKey::Index, self.config.index_ttl, || async {
                let result = self.build(cancel).await;
                if let Err(e) = &result {
                    if !e.is_cancelled() {
                        warn!(key = %CacheKey::Index, error = %e, "Index rebuild failed");
                    }
                }
                result
            })
            .await
    }

    /// Returns the cached index only if it is present and fresh.
    pub fn cached(&self) -> Option<Arc<[IndexEntry]>> {
        self.cache.get(&CacheKey::Index)
    }

    async fn build(&self, cancel: &CancellationToken) -> Result<Arc<[IndexEntry]>> {
        let rows = walk_listing(
            self.upstream.as_ref(),
            Resource::Entity,
            self.config.listing_page_size,
            cancel,
        )
        .await?;

        let mut entries: Vec<IndexEntry> = rows
            .into_iter()
            .map(|(id, name)| IndexEntry::new(id, name))
            .collect();
        entries.sort_by_key(|entry| entry.id);

        info!(entries = entries.len(), "Catalog index built");
        Ok(entries.into())
    }
}
