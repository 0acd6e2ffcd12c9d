//! bundle-health - readiness evaluation for resources installed from a bundle

pub mod bundle;
pub mod commands;
pub mod config;
pub mod health;
pub mod k8s;
pub mod utils;

pub use health::{AggregatedError, Evaluator, ObjectReference, Strategy};
