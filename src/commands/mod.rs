//! Command implementations for the bundle-health CLI

pub mod check;
