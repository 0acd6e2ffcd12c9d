//! Kubernetes client construction

use anyhow::{Context, Result};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::Path;

/// Connect using an explicit kubeconfig file, or the default chain
/// (`KUBECONFIG`, `~/.kube/config`, in-cluster) when none is given
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("Failed to create Kubernetes client from the default configuration");
    };

    if !path.exists() {
        return Err(crate::utils::errors::CliError::kubeconfig_not_found(&path.display().to_string()).into());
    }

    crate::log_debug!("Using kubeconfig: {}", path.display());
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("Failed to load kubeconfig: {}", path.display()))?;

    Client::try_from(config).context("Failed to create Kubernetes client")
}
