//! Runtime configuration for the catalog layer.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2/";
pub const DEFAULT_SPRITE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/";

const USER_AGENT: &str = concat!("dex-catalog/", env!("CARGO_PKG_VERSION"));

/// Settings shared by the upstream client and the cache owners.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Root of the upstream API; relative resource paths are joined onto it
    pub base_url: String,
    /// Per-request timeout for upstream calls
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Rows requested per listing page while walking a full listing
    pub listing_page_size: u32,
    /// Lifetime of the full `(id, name)` catalog index
    pub index_ttl: Duration,
    /// Lifetime of resolved category labels (near-static upstream)
    pub label_ttl: Duration,
    /// Lifetime of per-category member id sets
    pub members_ttl: Duration,
    /// Lifetime of the deduplicated category list
    pub categories_ttl: Duration,
    /// Locale whose label is preferred when a category carries several
    pub primary_locale: String,
    /// Locale consulted when the primary one is missing
    pub fallback_locale: String,
    /// Prefix for per-entity image URLs; `{id}.png` is appended
    pub sprite_base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(20),
            user_agent: USER_AGENT.to_string(),
            listing_page_size: 500,
            index_ttl: Duration::from_secs(60 * 60),
            label_ttl: Duration::from_secs(6 * 60 * 60),
            members_ttl: Duration::from_secs(60 * 60),
            categories_ttl: Duration::from_secs(60 * 60),
            primary_locale: "es".to_string(),
            fallback_locale: "en".to_string(),
            sprite_base_url: DEFAULT_SPRITE_BASE_URL.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn image_url(&self, id: u32) -> String {
        format!("{}{id}.png", self.sprite_base_url)
    }
}
