//! Kubernetes collaborators for the readiness core

pub mod client;
pub mod fetcher;
pub mod kstatus;
pub mod manifest;
pub mod ready;

pub use fetcher::KubeFetcher;
pub use kstatus::KstatusOracle;
pub use ready::KubeReadyChecker;
