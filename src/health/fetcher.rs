//! Live-state fetch capability

use async_trait::async_trait;
use kube::core::DynamicObject;

use super::error::FetchError;
use super::reference::ObjectReference;

/// Retrieves the current state of a referenced object.
///
/// Implementations must not cache: every call reflects the cluster as it is
/// now.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn get(&self, object: &ObjectReference) -> Result<DynamicObject, FetchError>;
}
