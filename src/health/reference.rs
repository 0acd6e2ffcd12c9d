//! Identity of a deployed resource

use kube::core::GroupVersionKind;
use std::fmt;

/// Identifies a single deployed resource by kind, namespace and name.
///
/// Cluster-scoped resources carry an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    pub gvk: GroupVersionKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectReference {
    pub fn new(gvk: GroupVersionKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a reference from an `apiVersion` string such as `apps/v1` or `v1`
    pub fn from_api_version(
        api_version: &str,
        kind: &str,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self::new(GroupVersionKind::gvk(group, version, kind), namespace, name)
    }

    /// Grouping key for diagnostics: `group/version, Kind=Kind`.
    ///
    /// Core kinds keep the empty group, e.g. `/v1, Kind=Service`, so keys
    /// match what the BundleDeployment controller reports.
    pub fn kind_string(&self) -> String {
        format!("{}/{}, Kind={}", self.gvk.group, self.gvk.version, self.gvk.kind)
    }

    /// `namespace/name` as shown in diagnostics
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// The namespace, or `None` for cluster-scoped references
    pub fn namespace(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(&self.namespace)
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind_string(), self.identifier())
    }
}
