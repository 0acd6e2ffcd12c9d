//! Fake collaborators for evaluator tests

use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::{FetchError, OracleError};
use super::fetcher::ResourceFetcher;
use super::heuristic::{StatusOracle, StatusResult, StatusValue};
use super::reference::ObjectReference;
use super::rollout::RolloutOracle;

/// An untyped object for `obj` with the given top-level data
pub fn object(obj: &ObjectReference, data: Value) -> DynamicObject {
    let mut live = DynamicObject::new(&obj.name, &ApiResource::from_gvk(&obj.gvk)).data(data);
    if let Some(ns) = obj.namespace() {
        live = live.within(ns);
    }
    live
}

pub fn api_service(status: Value) -> DynamicObject {
    let obj = ObjectReference::from_api_version(
        "apiregistration.k8s.io/v1",
        "APIService",
        "",
        "v1beta1.metrics.k8s.io",
    );
    object(&obj, serde_json::json!({ "status": status }))
}

#[derive(Default)]
pub struct CallLog {
    calls: Mutex<HashMap<ObjectReference, usize>>,
}

impl CallLog {
    fn record(&self, object: &ObjectReference) {
        let mut calls = self.calls.lock().unwrap();
        *calls.entry(object.clone()).or_default() += 1;
    }

    pub fn count(&self, object: &ObjectReference) -> usize {
        self.calls.lock().unwrap().get(object).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

/// Serves canned objects; anything not registered is `NotFound`
#[derive(Default)]
pub struct FakeFetcher {
    objects: HashMap<ObjectReference, DynamicObject>,
    pub log: CallLog,
}

impl FakeFetcher {
    pub fn with(mut self, object: &ObjectReference, live: DynamicObject) -> Self {
        self.objects.insert(object.clone(), live);
        self
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn get(&self, object: &ObjectReference) -> Result<DynamicObject, FetchError> {
        self.log.record(object);
        self.objects.get(object).cloned().ok_or(FetchError::NotFound)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Rollout {
    Ready,
    NotReady,
    Fails,
}

/// Answers from a fixed table; unknown objects are ready
#[derive(Default)]
pub struct FakeRollout {
    answers: HashMap<ObjectReference, Rollout>,
    pub log: CallLog,
}

impl FakeRollout {
    pub fn with(mut self, object: &ObjectReference, answer: Rollout) -> Self {
        self.answers.insert(object.clone(), answer);
        self
    }
}

#[async_trait]
impl RolloutOracle for FakeRollout {
    async fn is_ready(&self, object: &ObjectReference) -> Result<bool, OracleError> {
        self.log.record(object);
        match self.answers.get(object).copied().unwrap_or(Rollout::Ready) {
            Rollout::Ready => Ok(true),
            Rollout::NotReady => Ok(false),
            Rollout::Fails => Err(OracleError::Fetch(FetchError::NotFound)),
        }
    }
}

/// Reads `status.fake` as the status value and `status.message` as the message
pub struct FieldStatus;

impl StatusOracle for FieldStatus {
    fn compute(&self, live: &DynamicObject) -> Result<StatusResult, super::heuristic::ComputeError> {
        let status = live.data.get("status");
        let text = |field: &str| {
            status
                .and_then(|s| s.get(field))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let value = match text("fake").as_str() {
            "Current" => StatusValue::Current,
            "Failed" => StatusValue::Failed,
            "Terminating" => StatusValue::Terminating,
            "InProgress" => StatusValue::InProgress,
            "" => StatusValue::Current,
            other => {
                return Err(super::heuristic::ComputeError::InvalidField {
                    field: "status.fake".to_string(),
                    reason: format!("unexpected value {}", other),
                });
            }
        };
        Ok(StatusResult::new(value, text("message")))
    }
}
