//! Name and category filtering over the catalog.
//!
//! Filters are evaluated on `(id, name)` pairs only; no entity detail is
//! fetched here, so any page of an arbitrarily large match set costs at most
//! one index build plus one membership lookup.

use crate::category::CategoryResolver;
use crate::index::CatalogIndex;
use crate::model::{IndexEntry, IndexHit, Page, SearchFilter};
use crate::normalize;
use crate::upstream::{ListingCursor, Resource, Upstream, cancellable};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Entries whose normalized name starts with the normalized `name`, or, only
/// when there are none, entries whose normalized name contains it. Ordered by
/// display name ignoring case, then by id.
pub fn filter_by_name(entries: &[IndexEntry], name: &str) -> Vec<IndexHit> {
    let needle = normalize(name);

    let mut matched: Vec<&IndexEntry> = entries
        .iter()
        .filter(|entry| entry.normalized_name.starts_with(&needle))
        .collect();

    if matched.is_empty() {
        matched = entries
            .iter()
            .filter(|entry| entry.normalized_name.contains(&needle))
            .collect();
    }

    matched.sort_by_cached_key(|entry| (entry.name.to_lowercase(), entry.id));
    matched.into_iter().map(IndexHit::from).collect()
}

#[derive(Clone)]
pub struct SearchEngine {
    upstream: Arc<dyn Upstream>,
    index: CatalogIndex,
    categories: CategoryResolver,
}

impl SearchEngine {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        index: CatalogIndex,
        categories: CategoryResolver,
    ) -> Self {
        Self {
            upstream,
            index,
            categories,
        }
    }

    /// Runs a search and returns the requested page of `(id, name)` hits.
    ///
    /// The filter is clamped first; see [`SearchFilter::clamped`].
    pub async fn search(
        &self,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<IndexHit>> {
        let filter = filter.clamped();
        debug!(
            name = filter.name.as_deref(),
            category_id = filter.category_id,
            page = filter.page,
            page_size = filter.page_size,
            "search"
        );

        match (filter.name.as_deref(), filter.category_id) {
            (None, Some(category_id)) => self.by_category(category_id, &filter, cancel).await,
            (Some(name), None) => {
                let index = self.index.get(cancel).await?;
                let hits = filter_by_name(&index, name);
                Ok(Page::slice(&hits, filter.page, filter.page_size))
            }
            (Some(name), Some(category_id)) => {
                let index = self.index.get(cancel).await?;
                let members = self.categories.members(category_id, cancel).await?;

                let hits: Vec<IndexHit> = filter_by_name(&index, name)
                    .into_iter()
                    .filter(|hit| members.binary_search(&hit.id).is_ok())
                    .collect();
                Ok(Page::slice(&hits, filter.page, filter.page_size))
            }
            (None, None) => self.unfiltered(&filter, cancel).await,
        }
    }

    /// Category-only searches page straight through the member id list and
    /// never build the index. Names come from the index when it happens to be
    /// cached and are left empty otherwise.
    async fn by_category(
        &self,
        category_id: u32,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<IndexHit>> {
        let members = self.categories.members(category_id, cancel).await?;
        let ids = Page::slice(&members, filter.page, filter.page_size);

        let index = self.index.cached();
        let name_of = |id: u32| {
            index
                .as_deref()
                .and_then(|entries| {
                    entries
                        .binary_search_by_key(&id, |entry| entry.id)
                        .ok()
                        .map(|pos| entries[pos].name.clone())
                })
                .unwrap_or_default()
        };

        let hits: Vec<IndexHit> = ids
            .items
            .iter()
            .map(|&id| IndexHit { id, name: name_of(id) })
            .collect();
        Ok(ids.with_items(hits))
    }

    /// No filters: one upstream listing page, using the upstream total.
    async fn unfiltered(
        &self,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<IndexHit>> {
        let cursor = ListingCursor {
            resource: Resource::Entity,
            offset: filter.offset(),
            limit: filter.page_size,
        };
        let listing = cancellable(cancel, self.upstream.listing(&cursor)).await?;

        let items = listing
            .results
            .into_iter()
            .filter_map(|row| {
                Some(IndexHit {
                    id: row.id()?,
                    name: row.name,
                })
            })
            .collect();

        Ok(Page {
            items,
            page: filter.page,
            page_size: filter.page_size,
            total_count: listing.count,
        })
    }
}
