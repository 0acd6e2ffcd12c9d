//! Kind-aware rollout strategy

use async_trait::async_trait;
use std::sync::Arc;

use super::error::OracleError;
use super::reference::ObjectReference;
use super::{Classification, ReadinessCheck};

/// Decides whether a concrete kind has finished rolling out.
///
/// The oracle resolves the object itself; the evaluator does not fetch on its
/// behalf.
#[async_trait]
pub trait RolloutOracle: Send + Sync {
    async fn is_ready(&self, object: &ObjectReference) -> Result<bool, OracleError>;
}

pub struct RolloutCheck {
    oracle: Arc<dyn RolloutOracle>,
}

impl RolloutCheck {
    pub fn new(oracle: Arc<dyn RolloutOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl ReadinessCheck for RolloutCheck {
    async fn check(&self, object: &ObjectReference) -> Classification {
        match self.oracle.is_ready(object).await {
            Ok(true) => Classification::Ready,
            Ok(false) => Classification::NotReady("resource is not ready".to_string()),
            Err(err) => Classification::FetchError(err.to_string()),
        }
    }
}
