//! Readiness evaluation for deployed resources
//!
//! An [`Evaluator`] walks a list of [`ObjectReference`]s and classifies each
//! one through a [`ReadinessCheck`]. `APIService` objects always go to the
//! shared [`apiservice::ApiServiceCheck`]; everything else goes to the check
//! selected by the [`Strategy`]:
//!
//! - [`Strategy::KindAware`]: [`rollout::RolloutCheck`], Helm-style per-kind
//!   rollout rules behind a [`rollout::RolloutOracle`]
//! - [`Strategy::Status`]: [`heuristic::StatusCheck`], a kstatus-style
//!   computation behind a [`heuristic::StatusOracle`]
//!
//! The results are folded into one [`AggregatedError`] whose text does not
//! depend on input order.

pub mod aggregate;
pub mod apiservice;
pub mod conditions;
pub mod error;
pub mod fetcher;
pub mod heuristic;
pub mod reference;
pub mod rollout;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use aggregate::{AggregatedError, Evaluator, NotReadyGroups, ResourceFailure};
pub use error::{FetchError, OracleError};
pub use fetcher::ResourceFetcher;
pub use reference::ObjectReference;

/// Outcome of checking a single object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ready,
    NotReady(String),
    FetchError(String),
}

impl Classification {
    pub fn is_ready(&self) -> bool {
        matches!(self, Classification::Ready)
    }
}

/// One way of deciding whether an object is ready
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn check(&self, object: &ObjectReference) -> Classification;
}

/// Which checker handles objects that are not aggregated APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Per-kind rollout rules, as a package manager applies them
    #[default]
    KindAware,
    /// Generic status heuristic over conditions and observed generation
    Status,
}

impl Strategy {
    pub fn as_str(&self) -> &str {
        match self {
            Strategy::KindAware => "kind-aware",
            Strategy::Status => "status",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kind-aware" | "helm" => Ok(Strategy::KindAware),
            "status" | "kstatus" => Ok(Strategy::Status),
            other => Err(format!(
                "unknown strategy '{}' (expected 'kind-aware' or 'status')",
                other
            )),
        }
    }
}
