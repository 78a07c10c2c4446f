//! Read-through caching and search layer over the PokeAPI catalog.
//!
//! This crate builds a searchable local index from the upstream's paginated
//! listing, resolves category display labels with entity-to-category
//! fallback, filters by normalized name and category membership, and enriches
//! result pages through a bounded-concurrency detail fan-out. Upstream calls
//! are minimized with time-bounded caches that are never invalidated
//! explicitly and are never overwritten by a failed rebuild.

pub mod cache;
pub mod catalog;
pub mod category;
pub mod config;
pub mod error;
pub mod fanout;
pub mod index;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod search;
pub mod upstream;

// Re-export commonly used types
pub use cache::{CacheKey, TtlCache};
pub use catalog::Catalog;
pub use category::CategoryResolver;
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use fanout::{Enricher, MAX_IN_FLIGHT};
pub use index::CatalogIndex;
pub use model::{
    BulkReport, CategorySummary, EntityDetail, ExportRow, IndexEntry, IndexHit, Page,
    SearchFilter,
};
pub use normalize::normalize;
pub use notify::{LogNotifier, Notifier};
pub use search::{SearchEngine, filter_by_name};
pub use upstream::{InMemoryUpstream, PokeApiClient, Upstream};
