//! Related-object lookup seam.
//!
//! `Object.*` labels are resolved against the pod an event refers to. The
//! evaluator receives the fetcher as a parameter; the HTTP implementation
//! lives in the server crate.

use async_trait::async_trait;
use eventexporter_core::Pod;

/// The only involved-object kind that related-object labels support.
pub const RELATED_OBJECT_KIND: &str = "Pod";

/// Errors that can occur while fetching a related object.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("pods \"{name}\" not found in namespace \"{namespace}\"")]
    NotFound { namespace: String, name: String },

    #[error("related object lookup failed: {0}")]
    Unavailable(String),
}

/// Fetches the pod an event's `involvedObject` points at.
///
/// Called once per `Object.*` label per evaluation. Implementations must not
/// retry or cache.
#[async_trait]
pub trait RelatedObjectFetcher: Send + Sync {
    async fn fetch_pod(&self, namespace: &str, name: &str) -> Result<Pod, FetchError>;
}
