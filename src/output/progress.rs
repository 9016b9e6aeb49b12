use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{failure, status, success};
use crate::providers::gitlab::types::Pipeline;

/// Spinner shown on stderr while a pipeline is being waited on.
///
/// Anything written to the terminal while the spinner runs must go through
/// [`WaitProgress::suspend`], otherwise the spinner line ends up in the
/// middle of the job log.
pub struct WaitProgress {
    pb: ProgressBar,
}

impl WaitProgress {
    /// A spinner drawn on stderr. indicatif hides it on its own when stderr
    /// is not a terminal, which is the usual case inside CI jobs.
    pub fn stderr() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        Self { pb }
    }

    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn begin(&self, pipeline: &Pipeline) {
        self.pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.set_status(pipeline);
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    pub fn set_status(&self, pipeline: &Pipeline) {
        self.pb.set_message(format!(
            "Pipeline #{} is {}",
            pipeline.id,
            status(&pipeline.status)
        ));
    }

    /// Hides the spinner while `f` writes to the terminal.
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.pb.suspend(f)
    }

    pub fn succeed(&self, message: &str) {
        self.pb
            .finish_with_message(success(format!("{message} ✓")).to_string());
    }

    pub fn fail(&self, message: &str) {
        self.pb
            .abandon_with_message(failure(format!("{message} ✗")).to_string());
    }
}
