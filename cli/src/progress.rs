use crate::logger::Logger;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{stdout, IsTerminal};
use std::time::Duration;

pub(crate) enum ProgressStatus {
    Success,
    Error,
}

/// Spinner shown while waiting on a long running operation, e.g. a stack update
pub(crate) struct Progress {
    progress_bar: ProgressBar,
    resource_name: String,
}

impl Progress {
    pub(crate) fn new(resource_name: &str) -> Self {
        let progress_bar = Logger::multi_progress().add(ProgressBar::new_spinner());

        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            progress_bar.set_style(style);
        }

        progress_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress_bar,
            resource_name: resource_name.to_string(),
        }
    }

    pub(crate) fn log_stage(&self, stage: &str) {
        let msg = format!(
            "{} {}",
            console::style(self.with_padding(stage)).green().bold(),
            self.resource_name,
        );

        // Terminal or CI/CD?
        if stdout().is_terminal() {
            self.progress_bar.println(msg);
        } else {
            self.progress_bar.suspend(|| {
                println!("{msg}");
            });
        }
    }

    /// Current state, e.g. the stack status
    pub(crate) fn set_message(&self, message: &str) {
        self.progress_bar.set_message(format!(
            "{} {}",
            self.resource_name,
            console::style(message).dim()
        ));
    }

    pub(crate) fn finish(&self, stage: &str, status: ProgressStatus, message: Option<&str>) {
        let stage = console::style(self.with_padding(stage)).bold();
        let stage = match status {
            ProgressStatus::Success => stage.green(),
            ProgressStatus::Error => stage.red(),
        };
        let message = message.map(|m| format!(": {m}")).unwrap_or_default();

        if let Ok(style) = ProgressStyle::with_template("{msg}") {
            self.progress_bar.set_style(style);
        }

        self.progress_bar
            .finish_with_message(format!("{} {}{}", stage, self.resource_name, message));
    }

    // Required padding to make the message centered in the cargo-like style
    fn with_padding(&self, message: &str) -> String {
        format!("{message:>12}")
    }
}
