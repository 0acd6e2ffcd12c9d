//! Generic status heuristic strategy

use async_trait::async_trait;
use kube::core::DynamicObject;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::fetcher::ResourceFetcher;
use super::reference::ObjectReference;
use super::{Classification, ReadinessCheck};

/// Abstract status computed for any kind of object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusValue {
    InProgress,
    Failed,
    Current,
    Terminating,
    NotFound,
    Unknown,
}

impl StatusValue {
    pub fn as_str(&self) -> &str {
        match self {
            StatusValue::InProgress => "InProgress",
            StatusValue::Failed => "Failed",
            StatusValue::Current => "Current",
            StatusValue::Terminating => "Terminating",
            StatusValue::NotFound => "NotFound",
            StatusValue::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResult {
    pub status: StatusValue,
    pub message: String,
}

impl StatusResult {
    pub fn new(status: StatusValue, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// A well-known field had an unexpected shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    #[error("field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Computes a [`StatusResult`] from a live object
pub trait StatusOracle: Send + Sync {
    fn compute(&self, live: &DynamicObject) -> Result<StatusResult, ComputeError>;
}

/// Fetches each object and classifies it by its computed status.
///
/// Only `Current` is ready. Fetch and compute failures are fetch errors.
pub struct StatusCheck {
    fetcher: Arc<dyn ResourceFetcher>,
    oracle: Arc<dyn StatusOracle>,
}

impl StatusCheck {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, oracle: Arc<dyn StatusOracle>) -> Self {
        Self { fetcher, oracle }
    }
}

#[async_trait]
impl ReadinessCheck for StatusCheck {
    async fn check(&self, object: &ObjectReference) -> Classification {
        let live = match self.fetcher.get(object).await {
            Ok(live) => live,
            Err(err) => return Classification::FetchError(err.to_string()),
        };

        match self.oracle.compute(&live) {
            Ok(result) if result.status == StatusValue::Current => Classification::Ready,
            Ok(result) => {
                Classification::NotReady(format!("object {}: {}", result.status, result.message))
            }
            Err(err) => Classification::FetchError(err.to_string()),
        }
    }
}
