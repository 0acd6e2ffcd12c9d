//! Utility modules for bundle-health

pub mod errors;
pub mod logger;
pub mod progress;

// Re-export commonly used items
pub use errors::{CliError, enhance_error};
pub use logger::{log_error, log_info, log_warn};
pub use progress::WaitProgress;
