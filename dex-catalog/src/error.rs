//! Error types for catalog operations

use thiserror::Error;

/// Errors that can occur with catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The upstream has no such entity or category
    #[error("{resource} {id} not found upstream")]
    NotFound { resource: &'static str, id: String },

    /// Network-level failure talking to the upstream
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status other than 404
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Upstream body did not match the expected schema
    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request URL could not be built from the configured base URL
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A listing page pointed to a next page that cannot be followed
    #[error("Broken {resource} listing pagination: {reason}")]
    Pagination {
        resource: &'static str,
        reason: String,
    },

    /// The caller withdrew interest before the operation finished
    #[error("Operation cancelled")]
    Cancelled,

    /// A notifier failed to hand off a delivery
    #[error("Notification delivery failed: {0}")]
    Delivery(Box<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Entity or category absent upstream. Callers map this to an empty
    /// outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    /// Failures that may succeed if the whole request is retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Http(_)
                | CatalogError::Status { .. }
                | CatalogError::Decode(_)
                | CatalogError::InvalidUrl(_)
                | CatalogError::Pagination { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CatalogError::Cancelled)
    }
}

/// A specialized Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
