use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::auth::Token;
use crate::error::Result;
use crate::providers::gitlab::types::{Job, JobId, Pipeline, PipelineId, ProjectId};

/// Remote operations the trigger needs from a CI host.
///
/// Cancellation is handled by the caller dropping the returned future, so
/// implementations only need to be cancel-safe (which reqwest futures are).
#[async_trait]
pub trait PipelineGateway: Send + Sync {
    /// Starts a pipeline for `ref_` and returns it in its initial state.
    async fn trigger_pipeline(
        &self,
        project_id: ProjectId,
        ref_: &str,
        token: &Token,
        variables: &BTreeMap<String, String>,
    ) -> Result<Pipeline>;

    async fn pipeline(&self, project_id: ProjectId, pipeline_id: PipelineId) -> Result<Pipeline>;

    /// All jobs of the pipeline, across every page.
    async fn pipeline_jobs(
        &self,
        project_id: ProjectId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Job>>;

    /// The complete log of a job as currently stored by the host.
    async fn job_log(&self, project_id: ProjectId, job_id: JobId) -> Result<Vec<u8>>;
}
