//! Terminal progress for pipeline runs

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use playpass_core::{Error, PipelineObserver, Stage};
use std::time::Duration;

/// Spinner that follows the pipeline stage by stage
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.magenta} {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(100));
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for ProgressObserver {
    fn stage_started(&self, stage: Stage) {
        self.bar
            .set_message(format!("[{}/{}] {}", stage.number(), Stage::ALL.len(), stage));
    }

    fn stage_completed(&self, stage: Stage) {
        self.bar.println(format!("{} {}", style("✓").green(), stage));
    }

    fn stage_failed(&self, stage: Stage, error: &Error) {
        self.bar
            .println(format!("{} {}: {}", style("✗").red(), stage, style(error).dim()));
    }

    fn authentication_failed(&self, _error: &Error) {
        self.bar.suspend(|| {
            eprintln!(
                "{}",
                style("Login failed. Check the email and password in your configuration.")
                    .red()
                    .bold()
            );
        });
    }
}
