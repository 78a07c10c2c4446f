//! Entry point consumed by front ends, exporters and notifiers.

use crate::category::CategoryResolver;
use crate::fanout::Enricher;
use crate::index::CatalogIndex;
use crate::model::{
    BulkReport, CategorySummary, EntityDetail, ExportRow, IndexEntry, IndexHit, Page,
    SearchFilter,
};
use crate::notify::Notifier;
use crate::search::SearchEngine;
use crate::upstream::{PokeApiClient, Upstream};
use crate::{CatalogConfig, CatalogError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process-wide catalog handle. Cheap to clone; clones share every cache.
#[derive(Clone)]
pub struct Catalog {
    index: CatalogIndex,
    categories: CategoryResolver,
    search: SearchEngine,
    enricher: Enricher,
}

impl Catalog {
    pub fn new(upstream: Arc<dyn Upstream>, config: CatalogConfig) -> Self {
        let config = Arc::new(config);
        let index = CatalogIndex::new(upstream.clone(), config.clone());
        let categories = CategoryResolver::new(upstream.clone(), config.clone());
        let search = SearchEngine::new(upstream.clone(), index.clone(), categories.clone());
        let enricher = Enricher::new(upstream, categories.clone(), config);

        Self {
            index,
            categories,
            search,
            enricher,
        }
    }

    /// Builds a catalog over the HTTP upstream described by `config`.
    pub fn connect(config: CatalogConfig) -> Result<Self> {
        let client = PokeApiClient::new(&config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Searches and enriches the requested page. Entities whose detail
    /// cannot be fetched are missing from `items`; `total_count` still counts
    /// them.
    pub async fn search(
        &self,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<EntityDetail>> {
        let hits = self.search.search(filter, cancel).await?;
        let ids: Vec<u32> = hits.items.iter().map(|hit| hit.id).collect();
        let details = self.enricher.enrich(&ids, cancel).await?;
        Ok(hits.with_items(details))
    }

    /// The matching page of `(id, name)` pairs without enrichment.
    pub async fn search_hits(
        &self,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<IndexHit>> {
        self.search.search(filter, cancel).await
    }

    /// `None` when the entity does not exist upstream.
    pub async fn get_details(
        &self,
        id: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<EntityDetail>> {
        match self.enricher.detail(id, cancel).await {
            Ok(detail) => Ok(Some(detail)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_categories(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<[CategorySummary]>> {
        self.categories.list(cancel).await
    }

    /// Flat rows of the searched page, for spreadsheet or mail rendering.
    pub async fn export_rows(
        &self,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExportRow>> {
        let page = self.search(filter, cancel).await?;
        Ok(page.items.iter().map(ExportRow::from).collect())
    }

    pub async fn index(&self, cancel: &CancellationToken) -> Result<Arc<[IndexEntry]>> {
        self.index.get(cancel).await
    }

    pub async fn category_label(&self, id: u32, cancel: &CancellationToken) -> Result<String> {
        Ok(self.categories.label(id, cancel).await?.to_string())
    }

    pub async fn category_members(
        &self,
        category_id: u32,
        cancel: &CancellationToken,
    ) -> Result<Arc<[u32]>> {
        self.categories.members(category_id, cancel).await
    }

    pub async fn enrich(
        &self,
        ids: &[u32],
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityDetail>> {
        self.enricher.enrich(ids, cancel).await
    }

    pub async fn bulk_report(
        &self,
        ids: &[u32],
        cancel: &CancellationToken,
    ) -> Result<BulkReport> {
        self.enricher.bulk_report(ids, cancel).await
    }

    /// Resolves one entity and hands it to `notifier`.
    pub async fn send_one(
        &self,
        id: u32,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<EntityDetail> {
        let detail = self
            .get_details(id, cancel)
            .await?
            .ok_or_else(|| CatalogError::not_found("entity", id))?;

        notifier.deliver_one(&detail).await?;
        info!(id, "Single notification sent");
        Ok(detail)
    }

    /// Assembles a bulk report for `ids` and hands it to `notifier` unless
    /// nothing resolved.
    pub async fn send_bulk(
        &self,
        ids: &[u32],
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<BulkReport> {
        let report = self.enricher.bulk_report(ids, cancel).await?;
        if report.count == 0 {
            info!(requested = ids.len(), "Nothing to notify");
            return Ok(report);
        }

        notifier.deliver_bulk(&report).await?;
        info!(count = report.count, "Bulk notification sent");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::upstream::InMemoryUpstream;

    fn catalog() -> (Arc<InMemoryUpstream>, Catalog) {
        let upstream = Arc::new(
            InMemoryUpstream::new()
                .with_category(
                    1,
                    "bulbasaur",
                    &[("es", "Pokémon Semilla"), ("en", "Seed Pokémon")],
                    &[1, 2, 3],
                )
                .with_entity(1, "bulbasaur", 1)
                .with_entity(2, "ivysaur", 1)
                .with_entity(3, "venusaur", 1),
        );
        let catalog = Catalog::new(upstream.clone(), CatalogConfig::default());
        (upstream, catalog)
    }

    #[tokio::test]
    async fn test_search_enriches_page() {
        let (_, catalog) = catalog();
        let filter = SearchFilter {
            name: Some("vy".into()),
            ..Default::default()
        };

        let page = catalog.search(&filter, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.items.len(), 1);

        let detail = &page.items[0];
        assert_eq!(detail.id, 2);
        assert_eq!(detail.name, "ivysaur");
        assert_eq!(detail.category_label, "Pokémon Semilla");
        assert!(detail.image_url.ends_with("/2.png"));
    }

    #[tokio::test]
    async fn test_get_details_missing_is_none() {
        let (_, catalog) = catalog();
        let cancel = CancellationToken::new();

        assert!(catalog.get_details(999, &cancel).await.unwrap().is_none());
        let found = catalog.get_details(3, &cancel).await.unwrap().unwrap();
        assert_eq!(found.name, "venusaur");
    }

    #[tokio::test]
    async fn test_get_details_transient_failure_is_error() {
        let (upstream, catalog) = catalog();
        upstream.fail_entity(2);

        let err = catalog
            .get_details(2, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_clones_share_caches() {
        let (upstream, catalog) = catalog();
        let other = catalog.clone();
        let cancel = CancellationToken::new();

        catalog.index(&cancel).await.unwrap();
        other.index(&cancel).await.unwrap();
        assert_eq!(upstream.listing_calls(), 1);
    }

    #[tokio::test]
    async fn test_send_one_unknown_entity() {
        let (_, catalog) = catalog();
        let notifier = LogNotifier::new("ops@example.com");

        let err = catalog
            .send_one(404, &notifier, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_send_bulk_with_nothing_resolved() {
        let (_, catalog) = catalog();
        let notifier = LogNotifier::new("ops@example.com");

        let report = catalog
            .send_bulk(&[998, 999], &notifier, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.count, 0);
        assert!(report.entities.is_empty());
    }
}
