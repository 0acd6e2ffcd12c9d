//! kstatus-style status computation for arbitrary objects
//!
//! Generic properties come first (deletion, observed generation, the
//! `Reconciling`/`Stalled` conditions), then rules for the built-in workload
//! kinds. Anything else that passes the generic checks is `Current`.

use kube::core::DynamicObject;
use serde_json::Value;

use crate::health::conditions::{self, Condition, ConditionStatus};
use crate::health::heuristic::{ComputeError, StatusOracle, StatusResult, StatusValue};

/// [`StatusOracle`] backed by [`compute`]
#[derive(Debug, Default, Clone, Copy)]
pub struct KstatusOracle;

impl StatusOracle for KstatusOracle {
    fn compute(&self, live: &DynamicObject) -> Result<StatusResult, ComputeError> {
        compute(live)
    }
}

pub fn compute(live: &DynamicObject) -> Result<StatusResult, ComputeError> {
    let (group, kind) = group_kind(live);
    let data = &live.data;
    let conditions = read_conditions(data)?;

    if live.metadata.deletion_timestamp.is_some() {
        return Ok(StatusResult::new(
            StatusValue::Terminating,
            "Resource scheduled for deletion",
        ));
    }

    if let Some(observed) = int_at(data, &["status", "observedGeneration"])? {
        let generation = live.metadata.generation.unwrap_or(0);
        if observed != generation {
            return Ok(in_progress(format!(
                "{} generation is {}, but latest observed generation is {}",
                kind, generation, observed
            )));
        }
    }

    if let Some(c) = conditions::find(&conditions, "Reconciling")
        && c.status == ConditionStatus::True
    {
        return Ok(in_progress(c.message.clone()));
    }
    if let Some(c) = conditions::find(&conditions, "Stalled")
        && c.status == ConditionStatus::True
    {
        return Ok(StatusResult::new(StatusValue::Failed, c.message.clone()));
    }

    let specific = match (group.as_str(), kind.as_str()) {
        ("apps", "Deployment") => Some(deployment(data, &conditions)?),
        ("apps", "StatefulSet") => Some(stateful_set(data)?),
        ("apps", "DaemonSet") => Some(daemon_set(data)?),
        ("apps", "ReplicaSet") => Some(replica_set(data, &conditions)?),
        ("", "PersistentVolumeClaim") => Some(volume_claim(data)?),
        ("", "Pod") => Some(pod(data, &conditions)?),
        ("batch", "Job") => Some(job(data, &conditions)?),
        ("", "Service") => Some(service(data)?),
        ("policy", "PodDisruptionBudget") => Some(disruption_budget(data)?),
        ("apiextensions.k8s.io", "CustomResourceDefinition") => Some(crd(&conditions)),
        _ => None,
    };

    Ok(specific.unwrap_or_else(|| StatusResult::new(StatusValue::Current, "Resource is current")))
}

fn group_kind(live: &DynamicObject) -> (String, String) {
    match live.types.as_ref() {
        Some(types) => {
            let group = types
                .api_version
                .split_once('/')
                .map(|(group, _)| group)
                .unwrap_or_default();
            (group.to_string(), types.kind.clone())
        }
        None => (String::new(), String::new()),
    }
}

fn in_progress(message: impl Into<String>) -> StatusResult {
    StatusResult::new(StatusValue::InProgress, message)
}

fn current(message: impl Into<String>) -> StatusResult {
    StatusResult::new(StatusValue::Current, message)
}

fn invalid(path: &[&str], reason: &str) -> ComputeError {
    ComputeError::InvalidField {
        field: path.join("."),
        reason: reason.to_string(),
    }
}

fn lookup<'a>(data: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(data, |value, key| value.get(key))
        .filter(|v| !v.is_null())
}

fn int_at(data: &Value, path: &[&str]) -> Result<Option<i64>, ComputeError> {
    match lookup(data, path) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(path, "expected an integer")),
    }
}

fn int_or(data: &Value, path: &[&str], default: i64) -> Result<i64, ComputeError> {
    Ok(int_at(data, path)?.unwrap_or(default))
}

fn str_at<'a>(data: &'a Value, path: &[&str]) -> Result<Option<&'a str>, ComputeError> {
    match lookup(data, path) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(path, "expected a string")),
    }
}

fn read_conditions(data: &Value) -> Result<Vec<Condition>, ComputeError> {
    conditions::read_conditions(data).map_err(|err| invalid(&["status", "conditions"], &err.to_string()))
}

fn is_true(conditions: &[Condition], type_: &str) -> bool {
    conditions::find(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

fn deployment(data: &Value, conditions: &[Condition]) -> Result<StatusResult, ComputeError> {
    let mut progressing = false;
    let mut available = false;
    for c in conditions {
        match c.type_.as_str() {
            "Progressing" if c.reason == "ProgressDeadlineExceeded" => {
                return Ok(StatusResult::new(StatusValue::Failed, "Progress deadline exceeded"));
            }
            "Progressing" if c.status == ConditionStatus::True && c.reason == "NewReplicaSetAvailable" => {
                progressing = true;
            }
            "Available" if c.status == ConditionStatus::True => available = true,
            _ => {}
        }
    }

    let spec_replicas = int_or(data, &["spec", "replicas"], 1)?;
    let replicas = int_or(data, &["status", "replicas"], 0)?;
    let updated = int_or(data, &["status", "updatedReplicas"], 0)?;
    let ready = int_or(data, &["status", "readyReplicas"], 0)?;
    let available_replicas = int_or(data, &["status", "availableReplicas"], 0)?;

    if spec_replicas > replicas {
        return Ok(in_progress(format!("Replicas: {}/{}", replicas, spec_replicas)));
    }
    if spec_replicas > updated {
        return Ok(in_progress(format!("Updated: {}/{}", updated, spec_replicas)));
    }
    if replicas > spec_replicas {
        return Ok(in_progress(format!("Pending termination: {}", replicas - spec_replicas)));
    }
    if updated > available_replicas {
        return Ok(in_progress(format!("Available: {}/{}", available_replicas, updated)));
    }
    if spec_replicas > ready {
        return Ok(in_progress(format!("Ready: {}/{}", ready, spec_replicas)));
    }
    if !progressing {
        return Ok(in_progress("ReplicaSet not Available"));
    }
    if !available {
        return Ok(in_progress("Deployment not Available"));
    }
    Ok(current(format!("Deployment is available. Replicas: {}", replicas)))
}

fn stateful_set(data: &Value) -> Result<StatusResult, ComputeError> {
    if str_at(data, &["spec", "updateStrategy", "type"])? == Some("OnDelete") {
        return Ok(current("StatefulSet is using the ondelete update strategy"));
    }

    let spec_replicas = int_or(data, &["spec", "replicas"], 1)?;
    let replicas = int_or(data, &["status", "replicas"], 0)?;
    let ready = int_or(data, &["status", "readyReplicas"], 0)?;
    let current_replicas = int_or(data, &["status", "currentReplicas"], 0)?;
    let updated = int_or(data, &["status", "updatedReplicas"], 0)?;
    let partition = int_at(data, &["spec", "updateStrategy", "rollingUpdate", "partition"])?;

    if spec_replicas > replicas {
        return Ok(in_progress(format!("Replicas: {}/{}", replicas, spec_replicas)));
    }
    if spec_replicas > ready {
        return Ok(in_progress(format!("Ready: {}/{}", ready, spec_replicas)));
    }

    if let Some(partition) = partition.filter(|p| *p > 0) {
        let expected = (spec_replicas - partition).max(0);
        if updated < expected {
            return Ok(in_progress(format!("updated: {}/{}", updated, expected)));
        }
        return Ok(current(format!("Partition rollout complete. updated: {}", updated)));
    }

    if spec_replicas > current_replicas {
        return Ok(in_progress(format!("current: {}/{}", current_replicas, spec_replicas)));
    }
    let current_revision = str_at(data, &["status", "currentRevision"])?;
    let update_revision = str_at(data, &["status", "updateRevision"])?;
    if current_revision != update_revision {
        return Ok(in_progress(format!(
            "Waiting for updated revision {} to replace {}",
            update_revision.unwrap_or_default(),
            current_revision.unwrap_or_default()
        )));
    }
    Ok(current(format!("All replicas scheduled as expected. Replicas: {}", replicas)))
}

fn daemon_set(data: &Value) -> Result<StatusResult, ComputeError> {
    let Some(desired) = int_at(data, &["status", "desiredNumberScheduled"])? else {
        return Ok(in_progress("Missing .status.desiredNumberScheduled"));
    };
    let scheduled = int_or(data, &["status", "currentNumberScheduled"], 0)?;
    let updated = int_or(data, &["status", "updatedNumberScheduled"], 0)?;
    let available = int_or(data, &["status", "numberAvailable"], 0)?;
    let ready = int_or(data, &["status", "numberReady"], 0)?;

    if desired > scheduled {
        return Ok(in_progress(format!("Current: {}/{}", scheduled, desired)));
    }
    if desired > updated {
        return Ok(in_progress(format!("Updated: {}/{}", updated, desired)));
    }
    if desired > ready {
        return Ok(in_progress(format!("Ready: {}/{}", ready, desired)));
    }
    if desired > available {
        return Ok(in_progress(format!("Available: {}/{}", available, desired)));
    }
    Ok(current(format!("All replicas scheduled as expected. Replicas: {}", desired)))
}

fn replica_set(data: &Value, conditions: &[Condition]) -> Result<StatusResult, ComputeError> {
    if is_true(conditions, "ReplicaFailure") {
        return Ok(in_progress("Replica Failure condition. Check Pods"));
    }

    let spec_replicas = int_or(data, &["spec", "replicas"], 1)?;
    let replicas = int_or(data, &["status", "replicas"], 0)?;
    let labelled = int_or(data, &["status", "fullyLabeledReplicas"], 0)?;
    let available = int_or(data, &["status", "availableReplicas"], 0)?;
    let ready = int_or(data, &["status", "readyReplicas"], 0)?;

    if spec_replicas > labelled {
        return Ok(in_progress(format!("Labelled: {}/{}", labelled, spec_replicas)));
    }
    if spec_replicas > available {
        return Ok(in_progress(format!("Available: {}/{}", available, spec_replicas)));
    }
    if spec_replicas > ready {
        return Ok(in_progress(format!("Ready: {}/{}", ready, spec_replicas)));
    }
    if replicas > spec_replicas {
        return Ok(in_progress(format!("Pending termination: {}", replicas - spec_replicas)));
    }
    Ok(current(format!("ReplicaSet is available. Replicas: {}", replicas)))
}

fn volume_claim(data: &Value) -> Result<StatusResult, ComputeError> {
    match str_at(data, &["status", "phase"])? {
        Some("Bound") => Ok(current("PVC is Bound")),
        phase => Ok(in_progress(format!(
            "PVC is not Bound. phase: {}",
            phase.unwrap_or_default()
        ))),
    }
}

fn pod(data: &Value, conditions: &[Condition]) -> Result<StatusResult, ComputeError> {
    match str_at(data, &["status", "phase"])?.unwrap_or_default() {
        "Succeeded" => Ok(current("Pod has completed successfully")),
        "Failed" => Ok(StatusResult::new(
            StatusValue::Failed,
            "Pod has completed, but not successfully",
        )),
        "Running" => {
            if is_true(conditions, "Ready") {
                return Ok(current("Pod is Ready"));
            }
            if crash_looping(data)? {
                return Ok(StatusResult::new(
                    StatusValue::Failed,
                    "Pod has a container in CrashLoopBackOff",
                ));
            }
            Ok(in_progress("Pod is running but is not Ready"))
        }
        _ => {
            let unschedulable = conditions::find(conditions, "PodScheduled")
                .is_some_and(|c| c.status == ConditionStatus::False && c.reason == "Unschedulable");
            if unschedulable {
                return Ok(in_progress("Pod could not be scheduled"));
            }
            Ok(in_progress("Pod is in the Pending phase"))
        }
    }
}

fn crash_looping(data: &Value) -> Result<bool, ComputeError> {
    let Some(statuses) = lookup(data, &["status", "containerStatuses"]) else {
        return Ok(false);
    };
    let statuses = statuses
        .as_array()
        .ok_or_else(|| invalid(&["status", "containerStatuses"], "expected a list"))?;
    Ok(statuses.iter().any(|s| {
        s.get("state")
            .and_then(|state| state.get("waiting"))
            .and_then(|waiting| waiting.get("reason"))
            .and_then(Value::as_str)
            == Some("CrashLoopBackOff")
    }))
}

fn job(data: &Value, conditions: &[Condition]) -> Result<StatusResult, ComputeError> {
    let parallelism = int_or(data, &["spec", "parallelism"], 1)?;
    let completions = int_or(data, &["spec", "completions"], parallelism)?;
    let succeeded = int_or(data, &["status", "succeeded"], 0)?;
    let active = int_or(data, &["status", "active"], 0)?;
    let failed = int_or(data, &["status", "failed"], 0)?;

    if is_true(conditions, "Complete") {
        return Ok(current(format!("Job Completed. succeeded: {}/{}", succeeded, completions)));
    }
    if is_true(conditions, "Failed") {
        return Ok(StatusResult::new(
            StatusValue::Failed,
            format!("Job Failed. failed: {}/{}", failed, completions),
        ));
    }
    if str_at(data, &["status", "startTime"])?.is_none() {
        return Ok(in_progress("Job not started"));
    }
    Ok(in_progress(format!(
        "Job in progress. success:{}, active: {}, failed: {}",
        succeeded, active, failed
    )))
}

fn service(data: &Value) -> Result<StatusResult, ComputeError> {
    let service_type = str_at(data, &["spec", "type"])?.unwrap_or("ClusterIP");
    if service_type == "LoadBalancer" && str_at(data, &["spec", "clusterIP"])?.unwrap_or_default().is_empty() {
        return Ok(in_progress("ClusterIP not set. Service type: LoadBalancer"));
    }
    Ok(current("Service is ready"))
}

fn disruption_budget(data: &Value) -> Result<StatusResult, ComputeError> {
    let healthy = int_or(data, &["status", "currentHealthy"], 0)?;
    let desired = int_or(data, &["status", "desiredHealthy"], 0)?;
    if healthy < desired {
        return Ok(in_progress(format!("Budget not met. healthy replicas: {}/{}", healthy, desired)));
    }
    Ok(current(format!("Budget is met. Replicas: {}/{}", healthy, desired)))
}

fn crd(conditions: &[Condition]) -> StatusResult {
    if let Some(c) = conditions::find(conditions, "NamesAccepted")
        && c.status == ConditionStatus::False
    {
        return StatusResult::new(StatusValue::Failed, c.message.clone());
    }
    if is_true(conditions, "Established") {
        return current("CRD is established");
    }
    in_progress("CRD is not established")
}
