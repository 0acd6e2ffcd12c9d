//! User-facing errors with actionable suggestions

use colored::Colorize;
use thiserror::Error;

/// Error with suggestions, shown when the CLI cannot complete a command
#[derive(Error, Debug)]
#[error("{message}")]
pub struct CliError {
    pub message: String,
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Print the error and its suggestions to stderr
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.message);

        if !self.suggestions.is_empty() {
            eprintln!();
            eprintln!("{}", "Suggestions:".yellow().bold());
            for suggestion in &self.suggestions {
                eprintln!("  {} {}", "→".blue(), suggestion);
            }
        }
    }

    pub fn kubeconfig_not_found(path: &str) -> Self {
        Self::new(format!("Kubeconfig not found: {}", path))
            .suggest("Check the --kubeconfig path or the KUBECONFIG environment variable")
            .suggest("Omit --kubeconfig to use ~/.kube/config or in-cluster credentials")
    }

    pub fn no_objects() -> Self {
        Self::new("No objects found in the given manifests")
            .suggest("Pass rendered manifests with -f, one or more times")
            .suggest("Use -f - to read manifests from stdin")
    }

    pub fn connection_failed() -> Self {
        Self::new("Could not reach the cluster")
            .suggest("Check that the cluster is running and reachable")
            .suggest("Verify the current context: kubectl config current-context")
    }

    pub fn permission_denied() -> Self {
        Self::new("Permission denied while reading cluster resources")
            .suggest("The checker needs get/list access to every kind in the manifests")
            .suggest("Check RBAC with: kubectl auth can-i get <resource>")
    }

    pub fn timed_out(what: &str, secs: u64) -> Self {
        Self::new(format!("Timed out after {}s waiting for {}", secs, what))
            .suggest("Increase the timeout with --timeout or [wait] timeout_secs")
            .suggest("Run `bundle-health check -v` to see which resources are not ready")
    }
}

/// Attach suggestions to a command failure where the cause is recognizable
pub fn enhance_error(err: anyhow::Error) -> CliError {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return CliError {
            message: cli.message.clone(),
            suggestions: cli.suggestions.clone(),
        };
    }

    let err_str = format!("{:#}", err);
    let lower = err_str.to_lowercase();

    if lower.contains("connection refused") || lower.contains("dns error") {
        return CliError::connection_failed().suggest(format!("Underlying error: {}", err_str));
    }

    if lower.contains("forbidden") || lower.contains("unauthorized") {
        return CliError::permission_denied().suggest(format!("Underlying error: {}", err_str));
    }

    CliError::new(err_str).suggest("Run with -vv for more details")
}
