//! Readiness of aggregated API registrations
//!
//! An `APIService` is ready when its `Available` condition is not `False`.
//! Neither the rollout rules nor the status heuristic understand this kind,
//! so the evaluator routes it here under both strategies.

use async_trait::async_trait;
use kube::core::GroupVersionKind;
use std::sync::Arc;

use super::conditions::{self, ConditionStatus};
use super::fetcher::ResourceFetcher;
use super::reference::ObjectReference;
use super::{Classification, ReadinessCheck};

pub const API_SERVICE_GROUP: &str = "apiregistration.k8s.io";
pub const API_SERVICE_KIND: &str = "APIService";
pub const AVAILABLE: &str = "Available";

/// Whether objects of this kind are judged by their `Available` condition
pub fn is_aggregated_api(gvk: &GroupVersionKind) -> bool {
    gvk.group == API_SERVICE_GROUP && gvk.kind == API_SERVICE_KIND
}

pub struct ApiServiceCheck {
    fetcher: Arc<dyn ResourceFetcher>,
}

impl ApiServiceCheck {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ReadinessCheck for ApiServiceCheck {
    async fn check(&self, object: &ObjectReference) -> Classification {
        let live = match self.fetcher.get(object).await {
            Ok(live) => live,
            Err(err) => return Classification::FetchError(err.to_string()),
        };
        let conditions = match conditions::read_conditions(&live.data) {
            Ok(conditions) => conditions,
            Err(err) => return Classification::FetchError(err.to_string()),
        };

        match conditions::find(&conditions, AVAILABLE) {
            None => Classification::NotReady("Available condition not found".to_string()),
            Some(available) if available.status == ConditionStatus::False => {
                Classification::NotReady(available.message.clone())
            }
            Some(_) => Classification::Ready,
        }
    }
}
