//! indicatif-backed progress for pipeline runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lookout_core::{ProgressReporter, ReportOutcome};

/// CLI progress reporter using an indicatif spinner.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn target_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Monitoring [{current}/{total}] {name}"));
    }

    fn done(&self, _outcome: &ReportOutcome) {
        self.spinner.finish_and_clear();
    }
}
