//! Upstream catalog API boundary.
//!
//! The [`Upstream`] trait covers the three endpoint shapes the catalog layer
//! consumes: the paginated listing, per-entity detail and per-category record.
//! Response schemas are parsed defensively: missing or `null` optional fields
//! become empty/default values instead of failing the whole response.

mod http;
mod memory;

pub use http::PokeApiClient;
pub use memory::InMemoryUpstream;

use crate::{CatalogError, Result};
use serde::{Deserialize, Deserializer};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Listable upstream resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Entity,
    Category,
}

impl Resource {
    /// Path segment of the resource below the API root.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Entity => "pokemon",
            Resource::Category => "pokemon-species",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resource::Entity => "entity",
            Resource::Category => "category",
        }
    }
}

/// Position within a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingCursor {
    pub resource: Resource,
    pub offset: usize,
    pub limit: u32,
}

impl ListingCursor {
    /// First page of a listing. A zero `limit` is raised to 1.
    pub fn start(resource: Resource, limit: u32) -> Self {
        Self {
            resource,
            offset: 0,
            limit: limit.max(1),
        }
    }

    /// Parses the `next` link returned by upstream (`...?offset=500&limit=500`).
    /// Relative links are resolved against `base`.
    pub fn from_next_url(resource: Resource, base: &Url, next: &str) -> Option<Self> {
        let url = base.join(next).ok()?;

        let mut offset = None;
        let mut limit = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "offset" => offset = value.parse().ok(),
                "limit" => limit = value.parse().ok(),
                _ => {}
            }
        }

        Some(Self {
            resource,
            offset: offset?,
            limit: limit?,
        })
    }
}

/// A `{name, url}` reference to another upstream resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamedResource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

impl NamedResource {
    pub fn id(&self) -> Option<u32> {
        resource_id(&self.url)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Total rows across all pages, as reported upstream
    pub count: usize,
    pub results: Vec<NamedResource>,
    /// Absent on the last page
    pub next: Option<ListingCursor>,
}

/// Entity detail as returned by `pokemon/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weight: u32,
    #[serde(default)]
    pub base_experience: Option<u32>,
    #[serde(default, rename = "species")]
    pub category_ref: Option<NamedResource>,
}

/// Category record as returned by `pokemon-species/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CategoryRecord {
    /// Slug name, used when no localized label exists
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "genera", deserialize_with = "null_as_default")]
    pub localized_labels: Vec<LocalizedLabel>,
    #[serde(default, rename = "varieties", deserialize_with = "null_as_default")]
    pub variants: Vec<Variant>,
}

impl CategoryRecord {
    /// Label for `locale`, if present and not blank.
    pub fn label_for(&self, locale: &str) -> Option<&str> {
        self.localized_labels
            .iter()
            .find(|l| l.locale.as_ref().is_some_and(|r| r.name == locale))
            .map(|l| l.label.trim())
            .filter(|label| !label.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalizedLabel {
    #[serde(default, rename = "genus", deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, rename = "language")]
    pub locale: Option<NamedResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Variant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_default: bool,
    #[serde(default, rename = "pokemon")]
    pub entity_ref: Option<NamedResource>,
}

/// Client for the remote catalog.
///
/// Implementations report an absent resource as [`CatalogError::NotFound`]
/// and everything else as a transient failure. They neither cache nor retry.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch one page of a listing.
    async fn listing(&self, cursor: &ListingCursor) -> Result<Listing>;

    /// Fetch a single entity.
    async fn entity(&self, id: u32) -> Result<EntityRecord>;

    /// Fetch a single category record.
    async fn category(&self, id: u32) -> Result<CategoryRecord>;
}

/// Numeric id from the last non-empty path segment of a resource URL
/// (`https://pokeapi.co/api/v2/pokemon/35/` -> `35`).
pub fn resource_id(url: &str) -> Option<u32> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Runs an upstream call unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = call => result,
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id() {
        assert_eq!(resource_id("https://pokeapi.co/api/v2/pokemon/35/"), Some(35));
        assert_eq!(resource_id("https://pokeapi.co/api/v2/pokemon/35"), Some(35));
        assert_eq!(resource_id("pokemon-species/7/"), Some(7));
        assert_eq!(resource_id("https://pokeapi.co/api/v2/pokemon/"), None);
        assert_eq!(resource_id(""), None);
    }

    #[test]
    fn test_next_cursor() {
        let base = Url::parse("https://pokeapi.co/api/v2/").unwrap();
        let cursor = ListingCursor::from_next_url(
            Resource::Entity,
            &base,
            "https://pokeapi.co/api/v2/pokemon?offset=500&limit=500",
        );
        assert_eq!(
            cursor,
            Some(ListingCursor {
                resource: Resource::Entity,
                offset: 500,
                limit: 500,
            })
        );

        let relative =
            ListingCursor::from_next_url(Resource::Entity, &base, "/api/v2/pokemon?offset=1&limit=1");
        assert_eq!(
            relative,
            Some(ListingCursor {
                resource: Resource::Entity,
                offset: 1,
                limit: 1,
            })
        );

        assert_eq!(
            ListingCursor::from_next_url(Resource::Entity, &base, "https://x/pokemon?limit=5"),
            None
        );
        assert_eq!(
            ListingCursor::from_next_url(Resource::Entity, &base, "pokemon?offset=abc&limit=5"),
            None
        );
    }

    #[test]
    fn test_start_cursor_limit_is_at_least_one() {
        assert_eq!(ListingCursor::start(Resource::Category, 0).limit, 1);
        assert_eq!(ListingCursor::start(Resource::Category, 500).limit, 500);
    }

    #[test]
    fn test_entity_schema_tolerates_missing_fields() {
        let json = r#"{
            "id": 132,
            "name": "ditto",
            "height": 3,
            "weight": null,
            "base_experience": null,
            "species": {"name": "ditto", "url": "https://pokeapi.co/api/v2/pokemon-species/132/"},
            "abilities": []
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 132);
        assert_eq!(record.weight, 0);
        assert_eq!(record.base_experience, None);
        assert_eq!(record.category_ref.and_then(|r| r.id()), Some(132));
    }

    #[test]
    fn test_category_schema() {
        let json = r#"{
            "name": "bulbasaur",
            "genera": [
                {"genus": "Seed Pokémon", "language": {"name": "en", "url": ""}},
                {"genus": "Pokémon Semilla", "language": {"name": "es", "url": ""}},
                {"genus": "  ", "language": {"name": "fr", "url": ""}}
            ],
            "varieties": [
                {"is_default": true, "pokemon": {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"}}
            ]
        }"#;
        let record: CategoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.label_for("es"), Some("Pokémon Semilla"));
        assert_eq!(record.label_for("en"), Some("Seed Pokémon"));
        assert_eq!(record.label_for("fr"), None);
        assert_eq!(record.variants[0].entity_ref.as_ref().and_then(|r| r.id()), Some(1));

        let bare: CategoryRecord = serde_json::from_str(r#"{"genera": null}"#).unwrap();
        assert!(bare.localized_labels.is_empty());
        assert!(bare.variants.is_empty());
    }

    #[tokio::test]
    async fn test_cancellable_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, async { Ok(1) }).await;
        assert!(matches!(result, Err(CatalogError::Cancelled)));
    }
}
