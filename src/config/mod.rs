//! Configuration for bundle-health

pub mod settings;

pub use settings::Settings;
