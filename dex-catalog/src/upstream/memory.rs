use super::{
    CategoryRecord, EntityRecord, Listing, ListingCursor, LocalizedLabel, NamedResource, Resource,
    Upstream, Variant,
};
use crate::{CatalogError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

const BASE: &str = "https://pokeapi.co/api/v2/";

fn named(resource: Resource, id: u32, name: &str) -> NamedResource {
    NamedResource {
        name: name.to_string(),
        url: format!("{BASE}{}/{id}/", resource.path()),
    }
}

fn locale(name: &str) -> NamedResource {
    NamedResource {
        name: name.to_string(),
        url: String::new(),
    }
}

/// Counts a fetch as in flight until dropped, including when the fetch
/// future itself is dropped by cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process upstream backed by maps.
///
/// Useful for embedding a fixed catalog and for exercising the caching and
/// fan-out layers without a network. Every call is counted; listing and
/// per-entity failures and per-entity latency can be injected at runtime.
#[derive(Default)]
pub struct InMemoryUpstream {
    entities: BTreeMap<u32, EntityRecord>,
    categories: BTreeMap<u32, CategoryRecord>,
    latency: HashMap<u32, Duration>,

    failing_listing: AtomicBool,
    failing_entities: Mutex<HashSet<u32>>,
    failing_categories: Mutex<HashSet<u32>>,

    listing_calls: AtomicUsize,
    entity_calls: AtomicUsize,
    category_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity belonging to `category_id`. Height, weight and base
    /// experience are derived from the id so that fixtures stay short.
    pub fn with_entity(self, id: u32, name: &str, category_id: u32) -> Self {
        let category_name = self
            .categories
            .get(&category_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        self.with_entity_record(EntityRecord {
            id,
            name: name.to_string(),
            height: id % 20 + 1,
            weight: id * 10,
            base_experience: Some(id + 50),
            category_ref: Some(named(Resource::Category, category_id, &category_name)),
        })
    }

    pub fn with_entity_record(mut self, record: EntityRecord) -> Self {
        self.entities.insert(record.id, record);
        self
    }

    /// Adds a category with `(locale, label)` pairs and its member entity ids.
    pub fn with_category(
        mut self,
        id: u32,
        slug: &str,
        labels: &[(&str, &str)],
        members: &[u32],
    ) -> Self {
        let localized_labels = labels
            .iter()
            .map(|(loc, label)| LocalizedLabel {
                label: label.to_string(),
                locale: Some(locale(loc)),
            })
            .collect();

        let variants = members
            .iter()
            .enumerate()
            .map(|(idx, member)| Variant {
                is_default: idx == 0,
                entity_ref: Some(named(Resource::Entity, *member, "")),
            })
            .collect();

        self.categories.insert(
            id,
            CategoryRecord {
                name: slug.to_string(),
                localized_labels,
                variants,
            },
        );
        self
    }

    /// Delays every detail fetch of `id` by `delay`.
    pub fn with_latency(mut self, id: u32, delay: Duration) -> Self {
        self.latency.insert(id, delay);
        self
    }

    /// Makes every listing call fail with a transient error.
    pub fn set_listing_failure(&self, failing: bool) {
        self.failing_listing.store(failing, Ordering::SeqCst);
    }

    /// Makes detail fetches of `id` fail with a transient error.
    pub fn fail_entity(&self, id: u32) {
        self.failing_entities.lock().insert(id);
    }

    /// Makes category record fetches of `id` fail with a transient error.
    pub fn fail_category(&self, id: u32) {
        self.failing_categories.lock().insert(id);
    }

    /// Lifts every injected entity and category failure.
    pub fn clear_failures(&self) {
        self.failing_entities.lock().clear();
        self.failing_categories.lock().clear();
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn entity_calls(&self) -> usize {
        self.entity_calls.load(Ordering::SeqCst)
    }

    pub fn category_calls(&self) -> usize {
        self.category_calls.load(Ordering::SeqCst)
    }

    /// Highest number of entity fetches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn rows(&self, resource: Resource) -> Vec<NamedResource> {
        match resource {
            Resource::Entity => self
                .entities
                .values()
                .map(|e| named(resource, e.id, &e.name))
                .collect(),
            Resource::Category => self
                .categories
                .iter()
                .map(|(id, c)| named(resource, *id, &c.name))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl Upstream for InMemoryUpstream {
    async fn listing(&self, cursor: &ListingCursor) -> Result<Listing> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.failing_listing.load(Ordering::SeqCst) {
            return Err(CatalogError::Status {
                status: 503,
                url: format!("{BASE}{}", cursor.resource.path()),
            });
        }

        let rows = self.rows(cursor.resource);
        let end = cursor.offset.saturating_add(cursor.limit as usize);
        let next = (end < rows.len()).then_some(ListingCursor {
            offset: end,
            ..*cursor
        });

        Ok(Listing {
            count: rows.len(),
            results: rows
                .iter()
                .skip(cursor.offset)
                .take(cursor.limit as usize)
                .cloned()
                .collect(),
            next,
        })
    }

    async fn entity(&self, id: u32) -> Result<EntityRecord> {
        self.entity_calls.fetch_add(1, Ordering::SeqCst);
        {
            let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
            match self.latency.get(&id) {
                Some(delay) => tokio::time::sleep(*delay).await,
                None => tokio::task::yield_now().await,
            }
        }

        if self.failing_entities.lock().contains(&id) {
            return Err(CatalogError::Status {
                status: 502,
                url: format!("{BASE}pokemon/{id}"),
            });
        }

        self.entities
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(Resource::Entity.label(), id))
    }

    async fn category(&self, id: u32) -> Result<CategoryRecord> {
        self.category_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.failing_categories.lock().contains(&id) {
            return Err(CatalogError::Status {
                status: 503,
                url: format!("{BASE}{}/{id}", Resource::Category.path()),
            });
        }

        self.categories
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(Resource::Category.label(), id))
    }
}
