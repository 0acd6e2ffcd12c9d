//! Folding per-object classifications into one result

use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::apiservice::{ApiServiceCheck, is_aggregated_api};
use super::fetcher::ResourceFetcher;
use super::heuristic::{StatusCheck, StatusOracle};
use super::reference::ObjectReference;
use super::rollout::{RolloutCheck, RolloutOracle};
use super::{Classification, ReadinessCheck, Strategy};

/// Why an object ended up in the error list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureCause {
    /// Reading or judging the object failed; likely transient
    Fetch,
    /// The object was read and judged not ready
    NotReady,
}

/// One per-object diagnostic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceFailure {
    pub kind: String,
    pub identifier: String,
    pub message: String,
    pub cause: FailureCause,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.identifier, self.message)
    }
}

/// Not-ready objects keyed by kind string.
///
/// Both levels are sorted sets, so rendering does not depend on the order in
/// which objects were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotReadyGroups(BTreeMap<String, BTreeSet<String>>);

impl NotReadyGroups {
    pub fn insert(&mut self, kind: String, identifier: String) {
        self.0.entry(kind).or_default().insert(identifier);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, kind: &str) -> Option<&BTreeSet<String>> {
        self.0.get(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }
}

impl fmt::Display for NotReadyGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .0
            .iter()
            .map(|(kind, ids)| {
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                format!("{}: [{}]", kind, ids.join(", "))
            })
            .collect();
        f.write_str(&groups.join("; "))
    }
}

/// Result of a pass in which at least one object was not ready or could not
/// be checked.
///
/// Under [`Strategy::KindAware`] fetch errors and not-ready objects are kept
/// apart: the former in [`errors`](Self::errors), the latter in
/// [`not_ready`](Self::not_ready). Under [`Strategy::Status`] both land in
/// `errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedError {
    strategy: Strategy,
    errors: Vec<ResourceFailure>,
    not_ready: NotReadyGroups,
}

impl AggregatedError {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            errors: Vec::new(),
            not_ready: NotReadyGroups::default(),
        }
    }

    fn record(&mut self, object: &ObjectReference, classification: Classification) {
        let failure = |message: String, cause: FailureCause| ResourceFailure {
            kind: object.kind_string(),
            identifier: object.identifier(),
            message,
            cause,
        };

        match classification {
            Classification::Ready => {
                tracing::debug!(object = %object, "ready");
            }
            Classification::FetchError(message) => {
                tracing::debug!(object = %object, error = %message, "check failed");
                self.errors.push(failure(message, FailureCause::Fetch));
            }
            Classification::NotReady(message) => {
                tracing::debug!(object = %object, reason = %message, "not ready");
                match self.strategy {
                    Strategy::KindAware => {
                        self.not_ready.insert(object.kind_string(), object.identifier())
                    }
                    Strategy::Status => self.errors.push(failure(message, FailureCause::NotReady)),
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.not_ready.is_empty()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Per-object diagnostics, sorted by kind, identifier and message
    pub fn errors(&self) -> &[ResourceFailure] {
        &self.errors
    }

    pub fn not_ready(&self) -> &NotReadyGroups {
        &self.not_ready
    }

    /// Whether any object could not be read or judged at all
    pub fn has_fetch_errors(&self) -> bool {
        self.errors.iter().any(|e| e.cause == FailureCause::Fetch)
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        if !self.not_ready.is_empty() {
            lines.push(format!("unhealthy resources: {}", self.not_ready));
        }
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for AggregatedError {}

/// Drives a readiness strategy across a list of objects.
///
/// Every object is checked exactly once per [`evaluate`](Self::evaluate) call.
/// Nothing is kept between calls.
pub struct Evaluator {
    strategy: Strategy,
    aggregated_api: Arc<dyn ReadinessCheck>,
    primary: Arc<dyn ReadinessCheck>,
    concurrency: usize,
}

impl Evaluator {
    /// Per-kind rollout rules; the oracle resolves objects itself
    pub fn kind_aware(fetcher: Arc<dyn ResourceFetcher>, oracle: Arc<dyn RolloutOracle>) -> Self {
        Self {
            strategy: Strategy::KindAware,
            aggregated_api: Arc::new(ApiServiceCheck::new(fetcher)),
            primary: Arc::new(RolloutCheck::new(oracle)),
            concurrency: 1,
        }
    }

    /// Generic status heuristic over fetched snapshots
    pub fn status(fetcher: Arc<dyn ResourceFetcher>, oracle: Arc<dyn StatusOracle>) -> Self {
        Self {
            strategy: Strategy::Status,
            aggregated_api: Arc::new(ApiServiceCheck::new(fetcher.clone())),
            primary: Arc::new(StatusCheck::new(fetcher, oracle)),
            concurrency: 1,
        }
    }

    /// Check up to `n` objects at once. Output is the same for any `n`.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn route(&self, object: &ObjectReference) -> &dyn ReadinessCheck {
        if is_aggregated_api(&object.gvk) {
            self.aggregated_api.as_ref()
        } else {
            self.primary.as_ref()
        }
    }

    /// Check every object and fold the results.
    ///
    /// Returns `Ok(())` only if every object is ready.
    #[tracing::instrument(level = "debug", skip_all, fields(strategy = %self.strategy, objects = objects.len()))]
    pub async fn evaluate(&self, objects: &[ObjectReference]) -> Result<(), AggregatedError> {
        let results: Vec<(&ObjectReference, Classification)> = stream::iter(objects)
            .map(|object| async move { (object, self.route(object).check(object).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = AggregatedError::new(self.strategy);
        for (object, classification) in results {
            outcome.record(object, classification);
        }

        if outcome.is_empty() {
            return Ok(());
        }
        outcome.errors.sort();
        Err(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::testing::{FakeFetcher, FakeRollout, FieldStatus, Rollout, api_service, object};
    use serde_json::json;

    fn deployment(ns: &str, name: &str) -> ObjectReference {
        ObjectReference::from_api_version("apps/v1", "Deployment", ns, name)
    }

    fn service(ns: &str, name: &str) -> ObjectReference {
        ObjectReference::from_api_version("v1", "Service", ns, name)
    }

    fn metrics_api() -> ObjectReference {
        ObjectReference::from_api_version("apiregistration.k8s.io/v1", "APIService", "", "v1beta1.metrics.k8s.io")
    }

    fn widget(name: &str) -> ObjectReference {
        ObjectReference::from_api_version("example.com/v1", "Widget", "shop", name)
    }

    fn unavailable_api() -> serde_json::Value {
        json!({"conditions": [{"type": "Available", "status": "False", "message": "boom"}]})
    }

    #[tokio::test]
    async fn test_all_ready_succeeds() {
        let objects = vec![deployment("web", "a"), service("web", "a")];
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), Arc::new(FakeRollout::default()));
        assert!(evaluator.evaluate(&objects).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_input_succeeds() {
        let evaluator = Evaluator::status(Arc::new(FakeFetcher::default()), Arc::new(FieldStatus));
        assert!(evaluator.evaluate(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_kind_aware_groups_not_ready_by_kind() {
        let objects = vec![
            service("web", "b"),
            deployment("web", "z"),
            deployment("api", "a"),
            service("web", "ok"),
        ];
        let oracle = FakeRollout::default()
            .with(&objects[0], Rollout::NotReady)
            .with(&objects[1], Rollout::NotReady)
            .with(&objects[2], Rollout::NotReady);
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), Arc::new(oracle));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert!(err.errors().is_empty());
        assert!(!err.has_fetch_errors());
        assert_eq!(
            err.to_string(),
            "unhealthy resources: /v1, Kind=Service: [web/b]; apps/v1, Kind=Deployment: [api/a, web/z]"
        );
    }

    #[tokio::test]
    async fn test_every_object_visited_once_despite_failures() {
        let objects = vec![
            deployment("web", "a"),
            deployment("web", "b"),
            metrics_api(),
            deployment("web", "c"),
        ];
        let oracle = Arc::new(
            FakeRollout::default()
                .with(&objects[0], Rollout::Fails)
                .with(&objects[1], Rollout::NotReady),
        );
        let fetcher = Arc::new(FakeFetcher::default());
        let evaluator = Evaluator::kind_aware(fetcher.clone(), oracle.clone());

        assert!(evaluator.evaluate(&objects).await.is_err());
        for object in &objects[..2] {
            assert_eq!(oracle.log.count(object), 1);
        }
        assert_eq!(oracle.log.count(&objects[3]), 1);
        assert_eq!(fetcher.log.count(&objects[2]), 1);
        assert_eq!(oracle.log.total() + fetcher.log.total(), objects.len());
    }

    #[tokio::test]
    async fn test_aggregated_api_never_reaches_strategy() {
        let objects = vec![metrics_api(), deployment("web", "a")];
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with(&objects[0], api_service(json!({"conditions": [{"type": "Available", "status": "True"}]}))),
        );
        let oracle = Arc::new(FakeRollout::default());
        let evaluator = Evaluator::kind_aware(fetcher.clone(), oracle.clone());

        assert!(evaluator.evaluate(&objects).await.is_ok());
        assert_eq!(oracle.log.count(&objects[0]), 0);
        assert_eq!(fetcher.log.count(&objects[0]), 1);
    }

    #[tokio::test]
    async fn test_aggregated_api_skips_status_oracle() {
        // FieldStatus would call this object Current; the Available condition must win
        let objects = vec![metrics_api()];
        let fetcher = FakeFetcher::default().with(&objects[0], api_service(unavailable_api()));
        let evaluator = Evaluator::status(Arc::new(fetcher), Arc::new(FieldStatus));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "apiregistration.k8s.io/v1, Kind=APIService /v1beta1.metrics.k8s.io: boom"
        );
    }

    #[tokio::test]
    async fn test_unavailable_api_service_is_grouped_under_its_kind() {
        let api = ObjectReference::from_api_version("apiregistration.k8s.io/v1", "APIService", "ns", "name");
        let fetcher = FakeFetcher::default().with(&api, api_service(unavailable_api()));
        let evaluator = Evaluator::kind_aware(Arc::new(fetcher), Arc::new(FakeRollout::default()));

        let err = evaluator.evaluate(&[api.clone(), deployment("web", "a")]).await.unwrap_err();
        let group = err.not_ready().get(&api.kind_string()).unwrap();
        assert!(group.contains("ns/name"));
        assert_eq!(group.len(), 1);
        assert!(err.to_string().contains("apiregistration.k8s.io/v1, Kind=APIService: [ns/name]"));
    }

    #[tokio::test]
    async fn test_fetch_error_is_reported_not_swallowed() {
        let objects = vec![deployment("web", "a"), deployment("web", "b"), service("web", "c")];
        let oracle = FakeRollout::default().with(&objects[1], Rollout::Fails);
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), Arc::new(oracle));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert!(err.has_fetch_errors());
        assert!(err.not_ready().is_empty());
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].identifier, "web/b");
        assert_eq!(err.to_string(), "apps/v1, Kind=Deployment web/b: not found");
    }

    #[tokio::test]
    async fn test_kind_aware_keeps_fetch_errors_apart_from_not_ready() {
        let objects = vec![deployment("web", "a"), deployment("web", "b")];
        let oracle = FakeRollout::default()
            .with(&objects[0], Rollout::Fails)
            .with(&objects[1], Rollout::NotReady);
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), Arc::new(oracle));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "apps/v1, Kind=Deployment web/a: not found\n\
             unhealthy resources: apps/v1, Kind=Deployment: [web/b]"
        );
    }

    #[tokio::test]
    async fn test_status_strategy_joins_all_errors() {
        let objects = vec![widget("b"), widget("a"), widget("c"), widget("missing")];
        let fetcher = FakeFetcher::default()
            .with(&objects[0], object(&objects[0], json!({"status": {"fake": "InProgress", "message": "Replicas: 0/1"}})))
            .with(&objects[1], object(&objects[1], json!({"status": {"fake": "Failed", "message": "crashed"}})))
            .with(&objects[2], object(&objects[2], json!({"status": {"fake": "Current"}})));
        let evaluator = Evaluator::status(Arc::new(fetcher), Arc::new(FieldStatus));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert!(err.not_ready().is_empty());
        assert!(err.has_fetch_errors());
        assert_eq!(
            err.to_string(),
            "example.com/v1, Kind=Widget shop/a: object Failed: crashed\n\
             example.com/v1, Kind=Widget shop/b: object InProgress: Replicas: 0/1\n\
             example.com/v1, Kind=Widget shop/missing: not found"
        );
    }

    #[tokio::test]
    async fn test_status_strategy_not_ready_is_not_a_fetch_error() {
        let objects = vec![widget("a")];
        let fetcher = FakeFetcher::default()
            .with(&objects[0], object(&objects[0], json!({"status": {"fake": "InProgress"}})));
        let evaluator = Evaluator::status(Arc::new(fetcher), Arc::new(FieldStatus));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert!(!err.has_fetch_errors());
        assert_eq!(err.errors()[0].cause, FailureCause::NotReady);
    }

    #[tokio::test]
    async fn test_render_is_independent_of_input_order() {
        let mut objects = vec![
            deployment("web", "c"),
            service("web", "a"),
            deployment("api", "b"),
            deployment("web", "a"),
            widget("x"),
        ];
        let oracle = Arc::new(
            objects
                .iter()
                .take(4)
                .fold(FakeRollout::default(), |o, obj| o.with(obj, Rollout::NotReady))
                .with(&objects[4], Rollout::Fails),
        );
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), oracle);

        let forward = evaluator.evaluate(&objects).await.unwrap_err().to_string();
        objects.reverse();
        let backward = evaluator.evaluate(&objects).await.unwrap_err().to_string();
        objects.swap(0, 3);
        let shuffled = evaluator.evaluate(&objects).await.unwrap_err().to_string();

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[tokio::test]
    async fn test_status_render_is_independent_of_input_order() {
        let mut objects = vec![
            widget("c"),
            deployment("web", "b"),
            widget("a"),
            metrics_api(),
            service("web", "gone"),
        ];
        let fetcher = FakeFetcher::default()
            .with(&objects[0], object(&objects[0], json!({"status": {"fake": "Failed", "message": "crashed"}})))
            .with(&objects[1], object(&objects[1], json!({"status": {"fake": "InProgress", "message": "rolling"}})))
            .with(&objects[2], object(&objects[2], json!({"status": {"fake": "Terminating", "message": "going"}})))
            .with(&objects[3], api_service(unavailable_api()));
        let evaluator = Evaluator::status(Arc::new(fetcher), Arc::new(FieldStatus)).with_concurrency(3);

        let forward = evaluator.evaluate(&objects).await.unwrap_err().to_string();
        objects.reverse();
        let backward = evaluator.evaluate(&objects).await.unwrap_err().to_string();
        objects.swap(1, 4);
        let shuffled = evaluator.evaluate(&objects).await.unwrap_err().to_string();

        assert_eq!(forward.lines().count(), 5);
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        let mut sorted: Vec<&str> = forward.lines().collect();
        sorted.sort();
        assert_eq!(forward.lines().collect::<Vec<_>>(), sorted);
    }

    #[tokio::test]
    async fn test_duplicate_objects_are_deduplicated_in_groups() {
        let objects = vec![deployment("web", "a"), deployment("web", "a")];
        let oracle = FakeRollout::default().with(&objects[0], Rollout::NotReady);
        let evaluator = Evaluator::kind_aware(Arc::new(FakeFetcher::default()), Arc::new(oracle));

        let err = evaluator.evaluate(&objects).await.unwrap_err();
        assert_eq!(err.to_string(), "unhealthy resources: apps/v1, Kind=Deployment: [web/a]");
    }

    #[tokio::test]
    async fn test_repeated_evaluation_is_identical() {
        let objects = vec![widget("b"), widget("a"), metrics_api()];
        let fetcher = FakeFetcher::default()
            .with(&objects[0], object(&objects[0], json!({"status": {"fake": "InProgress", "message": "waiting"}})))
            .with(&objects[2], api_service(json!({"conditions": []})));
        let evaluator = Evaluator::status(Arc::new(fetcher), Arc::new(FieldStatus));

        let first = evaluator.evaluate(&objects).await.unwrap_err();
        let second = evaluator.evaluate(&objects).await.unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_output() {
        let objects: Vec<ObjectReference> = (0..12).map(|i| deployment("web", &format!("d{:02}", i))).collect();
        let oracle = Arc::new(
            objects
                .iter()
                .enumerate()
                .fold(FakeRollout::default(), |o, (i, obj)| match i % 3 {
                    0 => o.with(obj, Rollout::NotReady),
                    1 => o.with(obj, Rollout::Fails),
                    _ => o,
                }),
        );
        let fetcher: Arc<FakeFetcher> = Arc::new(FakeFetcher::default());

        let sequential = Evaluator::kind_aware(fetcher.clone(), oracle.clone())
            .evaluate(&objects)
            .await
            .unwrap_err();
        let parallel = Evaluator::kind_aware(fetcher, oracle.clone())
            .with_concurrency(4)
            .evaluate(&objects)
            .await
            .unwrap_err();

        assert_eq!(sequential.to_string(), parallel.to_string());
        assert_eq!(oracle.log.total(), objects.len() * 2);
    }
}
