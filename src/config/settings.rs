//! Configuration file support for bundle-health

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::health::Strategy;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub wait: WaitSettings,

    #[serde(default)]
    pub colors: Colors,
}

/// Default values for readiness checks
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Defaults {
    #[serde(default)]
    pub strategy: Strategy,

    /// Namespace for manifest documents that do not set one.
    /// If not set, the kubeconfig's default namespace is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Optional path to a kubeconfig file.
    /// If not set, KUBECONFIG or ~/.kube/config is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

/// Settings for `wait`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WaitSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on a single pass; a pass that runs longer is abandoned
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
}

/// Color settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Colors {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_interval_secs() -> u64 {
    5
}

fn default_pass_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            namespace: None,
            concurrency: default_concurrency(),
            kubeconfig: None,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interval_secs: default_interval_secs(),
            pass_timeout_secs: default_pass_timeout_secs(),
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Settings {
    /// Load settings from file or return defaults
    pub fn load() -> Self {
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path).unwrap_or_else(|err| {
                crate::log_warn!("Ignoring config file: {:#}", err);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Find config file in standard locations
    /// Priority:
    /// 1. .bundle-health.toml in current directory
    /// 2. ~/.config/bundle-health/config.toml (XDG config directory)
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(".bundle-health.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("bundle-health").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Generate example config file content
    pub fn example_config() -> String {
        let header = "# bundle-health configuration file\n\
                      # Place this file at ~/.config/bundle-health/config.toml or .bundle-health.toml in your project\n\n";

        match toml::to_string_pretty(&Settings::default()) {
            Ok(config) => format!("{}{}", header, config),
            Err(_) => format!(
                "{}[defaults]\nstrategy = \"kind-aware\"\nconcurrency = 1\n\n\
                 [wait]\ntimeout_secs = 300\ninterval_secs = 5\npass_timeout_secs = 60\n\n\
                 [colors]\nenabled = true\n",
                header
            ),
        }
    }
}
