use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::providers::gitlab::types::Status;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Why a wait ended before its work did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The configured timeout elapsed.
    DeadlineElapsed,
    /// The caller asked to stop.
    Cancelled,
}

/// Which limits apply to a piece of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The pipeline is still running: deadline and cancellation apply.
    Waiting,
    /// The pipeline has finished and remaining logs are being collected:
    /// only cancellation applies.
    Draining,
}

/// Decides when to stop waiting on a pipeline.
///
/// Every wait races the tick (or a gateway call) against the deadline and
/// the cancellation token; whichever fires first wins. Without a timeout
/// only a terminal status or cancellation ends the wait.
pub struct PipelinePoller {
    interval: Duration,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl PipelinePoller {
    /// Starts the clock: the deadline is `now + timeout`.
    pub fn start(interval: Duration, timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            interval,
            timeout,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
            cancel,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether `status` ends polling.
    pub fn is_finished(status: &Status) -> bool {
        status.is_pipeline_terminal()
    }

    /// Sleeps for one poll interval.
    pub async fn tick(&self) -> Result<(), Interrupt> {
        self.bounded(sleep(self.interval)).await
    }

    pub async fn run<F>(&self, scope: Scope, work: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        match scope {
            Scope::Waiting => self.bounded(work).await,
            Scope::Draining => self.cancellable(work).await,
        }
    }

    /// Runs `work` unless the deadline or cancellation comes first, in which
    /// case `work` is dropped.
    pub async fn bounded<F>(&self, work: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            () = deadline_elapsed(self.deadline) => Err(Interrupt::DeadlineElapsed),
            output = work => Ok(output),
        }
    }

    /// Runs `work` bounded by cancellation only.
    ///
    /// Used once the pipeline is known to be finished, when the deadline no
    /// longer applies.
    pub async fn cancellable<F>(&self, work: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            output = work => Ok(output),
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
