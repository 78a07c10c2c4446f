use super::{CategoryRecord, EntityRecord, Listing, ListingCursor, NamedResource, Resource, Upstream};
use crate::{CatalogConfig, CatalogError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Raw listing body: `{count, next, previous, results: [{name, url}]}`.
#[derive(Debug, Deserialize)]
struct ListingBody {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Option<Vec<NamedResource>>,
}

/// HTTP client for the PokeAPI v2 REST endpoints.
#[derive(Clone)]
pub struct PokeApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl PokeApiClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        // Url::join drops the last segment unless the base ends with a slash.
        let base_url = if config.base_url.ends_with('/') {
            Url::parse(&config.base_url)?
        } else {
            Url::parse(&format!("{}/", config.base_url))?
        };

        Ok(Self { client, base_url })
    }

    /// Cursor for upstream's `next` link; `None` only when there is no link.
    fn next_cursor(&self, resource: Resource, next: Option<&str>) -> Result<Option<ListingCursor>> {
        let Some(link) = next else {
            return Ok(None);
        };

        match ListingCursor::from_next_url(resource, &self.base_url, link) {
            Some(cursor) => Ok(Some(cursor)),
            None => {
                warn!(next = link, "Unparseable next link, aborting listing walk");
                Err(CatalogError::Pagination {
                    resource: resource.label(),
                    reason: format!("unparseable next link {link:?}"),
                })
            }
        }
    }

    fn resource_url(&self, resource: Resource, id: u32) -> Result<Url> {
        Ok(self.base_url.join(&format!("{}/{id}", resource.path()))?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        resource: Resource,
        id: impl ToString,
    ) -> Result<T> {
        debug!(%url, "upstream request");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::not_found(resource.label(), id));
        }

        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait::async_trait]
impl Upstream for PokeApiClient {
    async fn listing(&self, cursor: &ListingCursor) -> Result<Listing> {
        let mut url = self.base_url.join(cursor.resource.path())?;
        url.query_pairs_mut()
            .append_pair("offset", &cursor.offset.to_string())
            .append_pair("limit", &cursor.limit.to_string());

        let body: ListingBody = self
            .get_json(url, cursor.resource, format!("listing@{}", cursor.offset))
            .await?;

        let next = self.next_cursor(cursor.resource, body.next.as_deref())?;

        Ok(Listing {
            count: body.count,
            results: body.results.unwrap_or_default(),
            next,
        })
    }

    async fn entity(&self, id: u32) -> Result<EntityRecord> {
        let url = self.resource_url(Resource::Entity, id)?;
        self.get_json(url, Resource::Entity, id).await
    }

    async fn category(&self, id: u32) -> Result<CategoryRecord> {
        let url = self.resource_url(Resource::Category, id)?;
        self.get_json(url, Resource::Category, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = CatalogConfig {
            base_url: "https://pokeapi.co/api/v2".into(),
            ..Default::default()
        };
        let client = PokeApiClient::new(&config).unwrap();
        assert_eq!(client.base_url.as_str(), "https://pokeapi.co/api/v2/");

        let url = client.resource_url(Resource::Category, 25).unwrap();
        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon-species/25");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = CatalogConfig {
            base_url: "::nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            PokeApiClient::new(&config),
            Err(CatalogError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_next_link_resolution() {
        let client = PokeApiClient::new(&CatalogConfig::default()).unwrap();

        let relative = client
            .next_cursor(Resource::Entity, Some("/api/v2/pokemon?offset=1&limit=1"))
            .unwrap();
        assert_eq!(relative.map(|c| (c.offset, c.limit)), Some((1, 1)));

        let absolute = client
            .next_cursor(
                Resource::Entity,
                Some("https://pokeapi.co/api/v2/pokemon?offset=20&limit=20"),
            )
            .unwrap();
        assert_eq!(absolute.map(|c| (c.offset, c.limit)), Some((20, 20)));

        assert_eq!(client.next_cursor(Resource::Entity, None).unwrap(), None);
    }

    #[test]
    fn test_unparseable_next_link_is_an_error() {
        let client = PokeApiClient::new(&CatalogConfig::default()).unwrap();

        let err = client
            .next_cursor(Resource::Entity, Some("/api/v2/pokemon?page=2"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Pagination { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_listing_body() {
        let json = r#"{"count": 1302, "next": null, "previous": null, "results": [
            {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"}
        ]}"#;
        let body: ListingBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.count, 1302);
        assert!(body.next.is_none());
        assert_eq!(body.results.unwrap()[0].id(), Some(1));
    }
}
