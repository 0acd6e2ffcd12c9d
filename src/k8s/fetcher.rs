//! Fetching live objects through the Kubernetes API

use async_trait::async_trait;
use kube::api::Api;
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::{self, Scope};
use kube::Client;

use crate::health::error::FetchError;
use crate::health::fetcher::ResourceFetcher;
use crate::health::reference::ObjectReference;

/// Resolves each kind through discovery and reads the object untyped.
///
/// References without a namespace fall back to the client's default
/// namespace when the kind turns out to be namespaced.
pub struct KubeFetcher {
    client: Client,
}

impl KubeFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether objects of `gvk` live in a namespace
    pub async fn is_namespaced(&self, gvk: &GroupVersionKind) -> Result<bool, FetchError> {
        let (_, capabilities) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|source| FetchError::Discovery {
                kind: format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind),
                source,
            })?;
        Ok(matches!(capabilities.scope, Scope::Namespaced))
    }
}

#[async_trait]
impl ResourceFetcher for KubeFetcher {
    async fn get(&self, object: &ObjectReference) -> Result<DynamicObject, FetchError> {
        let (resource, capabilities) = discovery::pinned_kind(&self.client, &object.gvk)
            .await
            .map_err(|source| FetchError::Discovery {
                kind: object.kind_string(),
                source,
            })?;

        let api: Api<DynamicObject> = match (capabilities.scope, object.namespace()) {
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource),
            (Scope::Namespaced, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            (Scope::Namespaced, None) => Api::default_namespaced_with(self.client.clone(), &resource),
        };

        tracing::trace!(object = %object, plural = %resource.plural, "fetching");
        api.get_opt(&object.name).await?.ok_or(FetchError::NotFound)
    }
}
