//! Per-object failure types

use thiserror::Error;

/// Reading the live state of an object failed.
///
/// Always recorded against the object and never aborts a pass.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("failed to discover API resource for {kind}: {source}")]
    Discovery {
        kind: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to get object: {0}")]
    Api(#[source] kube::Error),

    #[error("malformed object: {0}")]
    Malformed(String),
}

/// The kind-aware rollout oracle could not decide
#[derive(Error, Debug)]
pub enum OracleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to list {what}: {source}")]
    List {
        what: String,
        #[source]
        source: kube::Error,
    },
}

impl From<kube::Error> for FetchError {
    fn from(err: kube::Error) -> Self {
        FetchError::Api(err)
    }
}
