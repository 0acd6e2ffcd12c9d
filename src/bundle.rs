//! BundleDeployment condition vocabulary
//!
//! The controller records the outcome of a readiness pass as the `Installed`
//! condition on the BundleDeployment it is reconciling.

use serde::{Deserialize, Serialize};

use crate::health::AggregatedError;

pub const TYPE_HAS_VALID_BUNDLE: &str = "HasValidBundle";
pub const TYPE_INVALID_BUNDLE_CONTENT: &str = "InvalidBundleContent";
pub const TYPE_INSTALLED: &str = "Installed";

pub const REASON_BUNDLE_LOOKUP_FAILED: &str = "BundleLookupFailed";
pub const REASON_BUNDLE_LOAD_FAILED: &str = "BundleLoadFailed";
pub const REASON_READING_CONTENT_FAILED: &str = "ReadingContentFailed";
pub const REASON_ERROR_GETTING_CLIENT: &str = "ErrorGettingClient";
pub const REASON_ERROR_GETTING_RELEASE_STATE: &str = "ErrorGettingReleaseState";
pub const REASON_INSTALL_FAILED: &str = "InstallFailed";
pub const REASON_UPGRADE_FAILED: &str = "UpgradeFailed";
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";
pub const REASON_CREATE_DYNAMIC_WATCH_FAILED: &str = "CreateDynamicWatchFailed";
pub const REASON_INSTALLATION_SUCCEEDED: &str = "InstallationSucceeded";
pub const REASON_MAX_GENERATED_BUNDLES_REACHED: &str = "MaxGenerationReached";

/// A status condition as written to a BundleDeployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// The `Installed` condition for the outcome of a readiness pass
pub fn installed_condition(result: &Result<(), AggregatedError>, generation: Option<i64>) -> BundleCondition {
    match result {
        Ok(()) => BundleCondition {
            type_: TYPE_INSTALLED.to_string(),
            status: "True".to_string(),
            reason: REASON_INSTALLATION_SUCCEEDED.to_string(),
            message: "Instantiated bundle successfully".to_string(),
            observed_generation: generation,
        },
        Err(err) => BundleCondition {
            type_: TYPE_INSTALLED.to_string(),
            status: "False".to_string(),
            reason: REASON_INSTALL_FAILED.to_string(),
            message: err.to_string(),
            observed_generation: generation,
        },
    }
}
