//! Progress indicators for long-running operations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner shown while `wait` polls a bundle
pub struct WaitProgress {
    pb: ProgressBar,
    subject: String,
}

impl WaitProgress {
    pub fn new(subject: &str) -> Self {
        Self::with_bar(create_spinner(&format!("Waiting for {} to be ready", subject)), subject)
    }

    /// A spinner that draws nowhere, for non-interactive output
    pub fn hidden(subject: &str) -> Self {
        Self::with_bar(ProgressBar::hidden(), subject)
    }

    fn with_bar(pb: ProgressBar, subject: &str) -> Self {
        Self {
            pb,
            subject: subject.to_string(),
        }
    }

    /// Show the outcome of the latest pass
    pub fn update(&self, pass: u32, status: &str) {
        self.pb
            .set_message(format!("{} (pass {}): {}", self.subject, pass, status));
    }

    pub fn message(&self) -> String {
        self.pb.message()
    }

    pub fn finish_success(&self) {
        self.pb.finish_with_message(format!("✓ {} ready", self.subject));
    }

    pub fn finish_error(&self, error: &str) {
        self.pb
            .finish_with_message(format!("✗ {} not ready: {}", self.subject, error));
    }
}
