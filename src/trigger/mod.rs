mod cursor;
mod gateway;
mod outcome;
mod poller;

use std::io::Write;

use indexmap::IndexMap;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

pub use cursor::LogCursorTracker;
pub use gateway::PipelineGateway;
pub use outcome::Outcome;
pub use poller::{Interrupt, PipelinePoller, Scope, DEFAULT_POLL_INTERVAL};

use crate::config::RunConfig;
use crate::error::RunError;
use crate::output::{self, JobRow, WaitProgress};
use crate::providers::gitlab::types::{Job, JobId, Pipeline};

/// Triggers a downstream pipeline and mirrors its job logs into `out` until
/// the pipeline finishes.
///
/// One `Trigger` drives exactly one pipeline. All state (cursors, the job
/// list) lives only as long as the value itself.
pub struct Trigger<G, W> {
    config: RunConfig,
    gateway: G,
    out: W,
    progress: WaitProgress,
    cursors: LogCursorTracker,
    /// Latest known state of every job, in first-seen order.
    jobs: IndexMap<JobId, Job>,
    /// Job whose output was written last, to know when to print a header.
    current_job: Option<JobId>,
    /// The last log byte written was not a newline.
    line_open: bool,
    triggered: bool,
}

impl<G, W> Trigger<G, W>
where
    G: PipelineGateway,
    W: Write,
{
    pub fn new(config: RunConfig, gateway: G, out: W) -> Self {
        Self {
            config,
            gateway,
            out,
            progress: WaitProgress::stderr(),
            cursors: LogCursorTracker::new(),
            jobs: IndexMap::new(),
            current_job: None,
            line_open: false,
            triggered: false,
        }
    }

    /// Triggers the pipeline, streams job logs while waiting for it and
    /// reports how it ended.
    ///
    /// Log output already written stays written whatever the result.
    ///
    /// # Errors
    /// Returns an error if triggering fails, any API call fails, the
    /// timeout elapses, `cancel` fires, or the pipeline does not succeed.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Pipeline, RunError> {
        let result = self.trigger_and_wait(cancel).await;

        if self.triggered {
            match &result {
                Ok(pipeline) => self
                    .progress
                    .succeed(&format!("Pipeline #{} {}", pipeline.id, pipeline.status)),
                Err(err) => self.progress.fail(&err.to_string()),
            }
        }

        if self.config.show_summary() && !self.jobs.is_empty() {
            let rows: Vec<JobRow<'_>> = self
                .jobs
                .values()
                .map(|job| JobRow {
                    job,
                    log_bytes: self.cursors.offset(job.id),
                })
                .collect();
            self.progress.suspend(|| output::print_job_summary(&rows));
        }

        result
    }

    async fn trigger_and_wait(&mut self, cancel: &CancellationToken) -> Result<Pipeline, RunError> {
        let project_id = self.config.project_id();

        let triggered = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(RunError::CancelledWhileTriggering { project_id });
            }
            result = self.gateway.trigger_pipeline(
                project_id,
                self.config.ref_(),
                self.config.pipeline_token(),
                self.config.variables(),
            ) => result,
        };
        let pipeline = triggered.map_err(|source| RunError::Trigger { project_id, source })?;
        self.triggered = true;

        info!("Outputting logs of downstream pipeline {}", pipeline.web_url);
        let out = &mut self.out;
        self.progress
            .suspend(|| output::write_pipeline_header(out, &pipeline))
            .map_err(|source| RunError::Progress {
                web_url: pipeline.web_url.clone(),
                source,
            })?;
        self.progress.begin(&pipeline);

        let poller = PipelinePoller::start(
            self.config.poll_interval(),
            self.config.timeout(),
            cancel.clone(),
        );
        let finished = self.poll_until_finished(&poller, &pipeline).await?;

        // The last tick may have read the logs just before the status turned
        // terminal, so collect whatever was appended since.
        self.stream_logs(&poller, Scope::Draining, &pipeline).await?;
        let (out, line_open) = (&mut self.out, self.line_open);
        self.progress
            .suspend(|| {
                if line_open {
                    writeln!(out)?;
                }
                output::write_pipeline_footer(out)
            })
            .map_err(|source| RunError::Progress {
                web_url: pipeline.web_url.clone(),
                source,
            })?;
        self.line_open = false;

        let outcome = Outcome::classify(&finished.status);
        info!(
            "Pipeline {} {outcome} with status '{}'",
            pipeline.web_url, finished.status
        );

        if outcome.is_success() {
            Ok(finished)
        } else {
            Err(RunError::PipelineFailed {
                web_url: pipeline.web_url,
                status: finished.status,
            })
        }
    }

    async fn poll_until_finished(
        &mut self,
        poller: &PipelinePoller,
        pipeline: &Pipeline,
    ) -> Result<Pipeline, RunError> {
        let project_id = self.config.project_id();
        let mut last_status = pipeline.status.clone();

        loop {
            poller
                .tick()
                .await
                .map_err(|interrupt| interrupted(interrupt, poller, pipeline))?;

            self.stream_logs(poller, Scope::Waiting, pipeline).await?;

            let current = poller
                .bounded(self.gateway.pipeline(project_id, pipeline.id))
                .await
                .map_err(|interrupt| interrupted(interrupt, poller, pipeline))?
                .map_err(|source| RunError::PipelineStatus {
                    web_url: pipeline.web_url.clone(),
                    source,
                })?;

            if current.status != last_status {
                info!("Pipeline {} is {}", pipeline.web_url, current.status);
                self.progress.set_status(&current);
                last_status = current.status.clone();
            }

            if PipelinePoller::is_finished(&current.status) {
                return Ok(current);
            }
        }
    }

    /// Lists the pipeline's jobs and writes out whatever each unsettled job
    /// has logged since the previous call.
    async fn stream_logs(
        &mut self,
        poller: &PipelinePoller,
        scope: Scope,
        pipeline: &Pipeline,
    ) -> Result<(), RunError> {
        let project_id = self.config.project_id();

        let mut listed = poller
            .run(scope, self.gateway.pipeline_jobs(project_id, pipeline.id))
            .await
            .map_err(|interrupt| interrupted(interrupt, poller, pipeline))?
            .map_err(|source| RunError::ListJobs {
                web_url: pipeline.web_url.clone(),
                source,
            })?;

        // Jobs first seen in the same poll are taken in id order.
        listed.sort_by_key(|job| job.id);
        for job in listed {
            if !self.cursors.is_tracked(job.id) {
                debug!("Job '{}' appeared ({})", job.name, job.web_url);
                self.cursors.track(job.id);
            }
            self.jobs.insert(job.id, job);
        }

        let pending: Vec<Job> = self
            .cursors
            .job_ids()
            .filter(|id| !self.cursors.is_settled(*id))
            .filter_map(|id| self.jobs.get(&id).cloned())
            .collect();

        for job in pending {
            let content = poller
                .run(scope, self.gateway.job_log(project_id, job.id))
                .await
                .map_err(|interrupt| interrupted(interrupt, poller, pipeline))?
                .map_err(|source| RunError::JobLog {
                    name: job.name.clone(),
                    web_url: job.web_url.clone(),
                    source,
                })?;

            self.emit(&job, &content)?;

            // The log was fetched after the job finished: nothing more can
            // be appended to it.
            if job.status.is_job_finished() {
                self.cursors.settle(job.id);
            }
        }

        Ok(())
    }

    fn emit(&mut self, job: &Job, content: &[u8]) -> Result<(), RunError> {
        let fresh = self.cursors.advance(job.id, content);
        if fresh.is_empty() {
            return Ok(());
        }
        debug!(
            "Job {} log advanced by {} bytes to {}",
            job.id,
            fresh.len(),
            self.cursors.offset(job.id)
        );

        let switched = self.current_job != Some(job.id);
        let (out, line_open) = (&mut self.out, self.line_open);
        self.progress
            .suspend(|| {
                if switched {
                    // Headers always start on a line of their own.
                    if line_open {
                        writeln!(out)?;
                    }
                    output::write_job_header(out, job)?;
                }
                out.write_all(fresh)?;
                out.flush()
            })
            .map_err(|source| RunError::Output {
                name: job.name.clone(),
                web_url: job.web_url.clone(),
                source,
            })?;

        self.current_job = Some(job.id);
        self.line_open = !fresh.ends_with(b"\n");
        Ok(())
    }

    #[cfg(test)]
    fn with_progress(mut self, progress: WaitProgress) -> Self {
        self.progress = progress;
        self
    }
}

fn interrupted(interrupt: Interrupt, poller: &PipelinePoller, pipeline: &Pipeline) -> RunError {
    match interrupt {
        Interrupt::DeadlineElapsed => RunError::TimedOut {
            web_url: pipeline.web_url.clone(),
            timeout: poller.timeout().unwrap_or_default(),
        },
        Interrupt::Cancelled => RunError::Cancelled {
            web_url: pipeline.web_url.clone(),
        },
    }
}
