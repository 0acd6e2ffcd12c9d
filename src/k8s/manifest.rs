//! Object references from rendered manifests

use anyhow::{Context, Result};
use kube::core::GroupVersionKind;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::health::reference::ObjectReference;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("document {index}: invalid YAML: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("document {index}: missing {field}")]
    MissingField { index: usize, field: &'static str },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    api_version: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    items: Vec<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    name: Option<String>,
    namespace: Option<String>,
}

/// Parse a multi-document YAML stream into object references.
///
/// Empty documents are skipped and `*List` documents are expanded.
/// Documents without `metadata.namespace` get an empty namespace; see
/// [`apply_default_namespace`].
pub fn parse_manifests(yaml: &str) -> Result<Vec<ObjectReference>, ManifestError> {
    let mut objects = Vec::new();
    for (index, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(doc).map_err(|source| ManifestError::Yaml { index, source })?;
        if value.is_null() {
            continue;
        }
        collect(index, value, &mut objects)?;
    }
    Ok(objects)
}

fn collect(index: usize, value: serde_yaml::Value, objects: &mut Vec<ObjectReference>) -> Result<(), ManifestError> {
    let doc: Document = serde_yaml::from_value(value).map_err(|source| ManifestError::Yaml { index, source })?;

    let kind = doc.kind.ok_or(ManifestError::MissingField { index, field: "kind" })?;
    if kind.ends_with("List") && !doc.items.is_empty() {
        for item in doc.items {
            collect(index, item, objects)?;
        }
        return Ok(());
    }

    let api_version = doc
        .api_version
        .ok_or(ManifestError::MissingField { index, field: "apiVersion" })?;
    let name = doc
        .metadata
        .name
        .ok_or(ManifestError::MissingField { index, field: "metadata.name" })?;
    let namespace = doc.metadata.namespace.unwrap_or_default();

    objects.push(ObjectReference::from_api_version(&api_version, &kind, namespace, name));
    Ok(())
}

/// Put `namespace` on references that have none, but only for kinds
/// `is_namespaced` accepts. Cluster-scoped references keep an empty namespace.
pub fn apply_default_namespace<F>(objects: &mut [ObjectReference], namespace: &str, is_namespaced: F)
where
    F: Fn(&GroupVersionKind) -> bool,
{
    for object in objects.iter_mut() {
        if object.namespace.is_empty() && is_namespaced(&object.gvk) {
            object.namespace = namespace.to_string();
        }
    }
}

/// Read and parse manifest files; `-` reads standard input
pub fn load_files(paths: &[PathBuf]) -> Result<Vec<ObjectReference>> {
    let mut objects = Vec::new();
    for path in paths {
        let contents = read_source(path)?;
        let parsed = parse_manifests(&contents)
            .with_context(|| format!("Failed to parse manifests from {}", path.display()))?;
        crate::log_debug!("{}: {} object(s)", path.display(), parsed.len());
        objects.extend(parsed);
    }
    Ok(objects)
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("Failed to read manifests from stdin")?;
        return Ok(contents);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read manifest file: {}", path.display()))
}
