//! Per-kind rollout readiness, following the rules Helm applies when it waits
//! for an install or upgrade
//!
//! The rule functions are pure over typed objects; [`KubeReadyChecker`]
//! fetches what they need from the cluster.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, ReplicationController, Service};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::health::error::{FetchError, OracleError};
use crate::health::reference::ObjectReference;
use crate::health::rollout::RolloutOracle;

const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";
const DEFAULT_BACKOFF_LIMIT: i32 = 6;

/// Rollout oracle backed by the Kubernetes API
pub struct KubeReadyChecker {
    client: Client,
}

impl KubeReadyChecker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced_api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }

    async fn get<K>(&self, object: &ObjectReference) -> Result<K, OracleError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api = self.namespaced_api::<K>(object.namespace());
        let found = api.get_opt(&object.name).await.map_err(FetchError::from)?;
        Ok(found.ok_or(FetchError::NotFound)?)
    }

    async fn list<K>(&self, what: &str, namespace: Option<&str>, selector: &str) -> Result<Vec<K>, OracleError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let params = ListParams::default().labels(selector);
        let list = self
            .namespaced_api::<K>(namespace)
            .list(&params)
            .await
            .map_err(|source| OracleError::List {
                what: what.to_string(),
                source,
            })?;
        Ok(list.items)
    }

    async fn pods_ready(&self, namespace: Option<&str>, selector: &str) -> Result<bool, OracleError> {
        let pods: Vec<Pod> = self.list("pods", namespace, selector).await?;
        Ok(pods.iter().all(pod_ready))
    }

    async fn deployment_is_ready(&self, object: &ObjectReference) -> Result<bool, OracleError> {
        let deployment: Deployment = self.get(object).await?;
        if deployment.spec.as_ref().and_then(|s| s.paused).unwrap_or(false) {
            return Ok(true);
        }

        let selector = deployment
            .spec
            .as_ref()
            .map(|s| selector_string(&s.selector))
            .unwrap_or_default();
        let namespace = deployment.metadata.namespace.clone();
        let replica_sets: Vec<ReplicaSet> = self
            .list("replicasets", namespace.as_deref(), &selector)
            .await?;

        match newest_replica_set(&deployment, &replica_sets) {
            Some(rs) => Ok(deployment_ready(&deployment, rs)),
            None => {
                tracing::debug!(object = %object, "no current replica set yet");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl RolloutOracle for KubeReadyChecker {
    async fn is_ready(&self, object: &ObjectReference) -> Result<bool, OracleError> {
        let group = object.gvk.group.as_str();
        match (group, object.gvk.kind.as_str()) {
            ("", "Pod") => Ok(pod_ready(&self.get::<Pod>(object).await?)),
            ("batch", "Job") => Ok(job_ready(&self.get::<Job>(object).await?)),
            ("apps" | "extensions", "Deployment") => self.deployment_is_ready(object).await,
            ("", "PersistentVolumeClaim") => {
                Ok(volume_claim_ready(&self.get::<PersistentVolumeClaim>(object).await?))
            }
            ("", "Service") => Ok(service_ready(&self.get::<Service>(object).await?)),
            ("apps" | "extensions", "DaemonSet") => {
                Ok(daemon_set_ready(&self.get::<DaemonSet>(object).await?))
            }
            ("apps", "StatefulSet") => Ok(stateful_set_ready(&self.get::<StatefulSet>(object).await?)),
            ("apps" | "extensions", "ReplicaSet") => {
                let rs: ReplicaSet = self.get(object).await?;
                if !generation_observed(rs.metadata.generation, rs.status.as_ref().and_then(|s| s.observed_generation)) {
                    return Ok(false);
                }
                let selector = rs.spec.as_ref().map(|s| selector_string(&s.selector)).unwrap_or_default();
                self.pods_ready(rs.metadata.namespace.as_deref(), &selector).await
            }
            ("", "ReplicationController") => {
                let rc: ReplicationController = self.get(object).await?;
                if !generation_observed(rc.metadata.generation, rc.status.as_ref().and_then(|s| s.observed_generation)) {
                    return Ok(false);
                }
                let selector = rc
                    .spec
                    .as_ref()
                    .and_then(|s| s.selector.as_ref())
                    .map(labels_string)
                    .unwrap_or_default();
                self.pods_ready(rc.metadata.namespace.as_deref(), &selector).await
            }
            ("apiextensions.k8s.io", "CustomResourceDefinition") => {
                let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
                let crd = api
                    .get_opt(&object.name)
                    .await
                    .map_err(FetchError::from)?
                    .ok_or(FetchError::NotFound)?;
                Ok(crd_ready(&crd))
            }
            _ => Ok(true),
        }
    }
}

fn generation_observed(generation: Option<i64>, observed: Option<i64>) -> bool {
    observed.unwrap_or(0) >= generation.unwrap_or(0)
}

pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

pub fn job_ready(job: &Job) -> bool {
    let spec = job.spec.as_ref();
    let status = job.status.as_ref();
    let failed = status.and_then(|s| s.failed).unwrap_or(0);
    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
    let backoff_limit = spec.and_then(|s| s.backoff_limit).unwrap_or(DEFAULT_BACKOFF_LIMIT);

    if failed > backoff_limit {
        return false;
    }
    match spec.and_then(|s| s.completions) {
        Some(completions) => succeeded >= completions,
        None => true,
    }
}

pub fn volume_claim_ready(pvc: &PersistentVolumeClaim) -> bool {
    pvc.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Bound")
}

pub fn service_ready(service: &Service) -> bool {
    let Some(spec) = service.spec.as_ref() else {
        return false;
    };
    let service_type = spec.type_.as_deref().unwrap_or("ClusterIP");
    if service_type == "ExternalName" {
        return true;
    }
    if spec.cluster_ip.as_deref().unwrap_or_default().is_empty() {
        return false;
    }
    if service_type == "LoadBalancer" {
        if spec.external_ips.as_ref().is_some_and(|ips| !ips.is_empty()) {
            return true;
        }
        return service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .is_some_and(|ingress| !ingress.is_empty());
    }
    true
}

pub fn daemon_set_ready(ds: &DaemonSet) -> bool {
    let strategy = ds.spec.as_ref().and_then(|s| s.update_strategy.as_ref());
    if strategy.and_then(|s| s.type_.as_deref()).unwrap_or("RollingUpdate") != "RollingUpdate" {
        return true;
    }
    let Some(status) = ds.status.as_ref() else {
        return false;
    };
    if !generation_observed(ds.metadata.generation, status.observed_generation) {
        return false;
    }
    let desired = status.desired_number_scheduled;
    if status.updated_number_scheduled.unwrap_or(0) != desired {
        return false;
    }

    let max_unavailable = scaled_value(
        strategy
            .and_then(|s| s.rolling_update.as_ref())
            .and_then(|r| r.max_unavailable.as_ref()),
        desired,
        true,
        1,
    );
    status.number_ready >= desired - max_unavailable
}

pub fn stateful_set_ready(sts: &StatefulSet) -> bool {
    let spec = sts.spec.as_ref();
    let strategy = spec.and_then(|s| s.update_strategy.as_ref());
    if strategy.and_then(|s| s.type_.as_deref()).unwrap_or("RollingUpdate") != "RollingUpdate" {
        return true;
    }
    let Some(status) = sts.status.as_ref() else {
        return false;
    };
    if !generation_observed(sts.metadata.generation, status.observed_generation) {
        return false;
    }

    let replicas = spec.and_then(|s| s.replicas).unwrap_or(1);
    let partition = strategy
        .and_then(|s| s.rolling_update.as_ref())
        .and_then(|r| r.partition)
        .unwrap_or(0);

    if status.updated_replicas.unwrap_or(0) < replicas - partition {
        return false;
    }
    if status.ready_replicas.unwrap_or(0) != replicas {
        return false;
    }
    if partition == 0 && status.current_revision != status.update_revision {
        return false;
    }
    true
}

pub fn crd_ready(crd: &CustomResourceDefinition) -> bool {
    let conditions = crd
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    for condition in conditions {
        match condition.type_.as_str() {
            "Established" if condition.status == "True" => return true,
            // A naming conflict is not something waiting can fix
            "NamesAccepted" if condition.status == "False" => return true,
            _ => {}
        }
    }
    false
}

/// Ready when the current replica set has enough ready pods to satisfy the
/// deployment's unavailability budget
pub fn deployment_ready(deployment: &Deployment, current: &ReplicaSet) -> bool {
    let replicas = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let expected_ready = replicas - deployment_max_unavailable(deployment);
    let ready = current
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= expected_ready
}

/// Pick the replica set owned by `deployment` that carries its current
/// revision. Without a revision annotation on the deployment, the owned
/// replica set with the highest revision wins.
pub fn newest_replica_set<'a>(deployment: &Deployment, replica_sets: &'a [ReplicaSet]) -> Option<&'a ReplicaSet> {
    let uid = deployment.metadata.uid.as_deref()?;
    let owned = replica_sets.iter().filter(|rs| {
        rs.metadata
            .owner_references
            .as_ref()
            .is_some_and(|refs| refs.iter().any(|r| r.uid == uid))
    });

    match revision(&deployment.metadata.annotations) {
        Some(current) => owned
            .into_iter()
            .find(|rs| revision(&rs.metadata.annotations) == Some(current)),
        None => owned.max_by_key(|rs| revision(&rs.metadata.annotations).unwrap_or(0)),
    }
}

fn revision(annotations: &Option<BTreeMap<String, String>>) -> Option<i64> {
    annotations
        .as_ref()
        .and_then(|a| a.get(REVISION_ANNOTATION))
        .and_then(|v| v.parse().ok())
}

/// How many pods may be unavailable during a rolling update.
///
/// Surge rounds up and unavailability rounds down; if both come out zero,
/// one pod may be unavailable. Recreate deployments allow none.
pub fn deployment_max_unavailable(deployment: &Deployment) -> i32 {
    let Some(spec) = deployment.spec.as_ref() else {
        return 0;
    };
    let replicas = spec.replicas.unwrap_or(1);
    let strategy = spec.strategy.as_ref();
    if strategy.and_then(|s| s.type_.as_deref()).unwrap_or("RollingUpdate") != "RollingUpdate"
        || replicas == 0
    {
        return 0;
    }

    let rolling = strategy.and_then(|s| s.rolling_update.as_ref());
    let quarter = IntOrString::String("25%".to_string());
    let surge = scaled_value(
        Some(rolling.and_then(|r| r.max_surge.as_ref()).unwrap_or(&quarter)),
        replicas,
        true,
        0,
    );
    let mut unavailable = scaled_value(
        Some(rolling.and_then(|r| r.max_unavailable.as_ref()).unwrap_or(&quarter)),
        replicas,
        false,
        0,
    );
    if surge == 0 && unavailable == 0 {
        unavailable = 1;
    }
    unavailable.min(replicas)
}

/// Resolve an int-or-percent against `total`
pub fn scaled_value(value: Option<&IntOrString>, total: i32, round_up: bool, default: i32) -> i32 {
    match value {
        None => default,
        Some(IntOrString::Int(n)) => *n,
        Some(IntOrString::String(s)) => {
            let Some(percent) = s.strip_suffix('%').and_then(|p| p.parse::<i64>().ok()) else {
                return default;
            };
            let scaled = percent * i64::from(total);
            let value = if round_up { (scaled + 99) / 100 } else { scaled / 100 };
            value as i32
        }
    }
}

/// Render a label selector in the list-query syntax
pub fn selector_string(selector: &LabelSelector) -> String {
    let mut terms: Vec<String> = Vec::new();
    if let Some(labels) = selector.match_labels.as_ref() {
        terms.push(labels_string(labels));
    }
    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.clone().unwrap_or_default().join(",");
        let term = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values),
            "NotIn" => format!("{} notin ({})", expr.key, values),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            _ => continue,
        };
        terms.push(term);
    }
    terms.retain(|t| !t.is_empty());
    terms.join(",")
}

fn labels_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
