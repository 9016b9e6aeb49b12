mod core;
mod jobs;
mod pipelines;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use self::core::{normalize_base_url, ClientOptions, GitLabClient};

use super::types::{Job, JobId, Pipeline, PipelineId, ProjectId};
use crate::auth::Token;
use crate::error::Result;
use crate::trigger::PipelineGateway;

#[async_trait]
impl PipelineGateway for GitLabClient {
    async fn trigger_pipeline(
        &self,
        project_id: ProjectId,
        ref_: &str,
        token: &Token,
        variables: &BTreeMap<String, String>,
    ) -> Result<Pipeline> {
        GitLabClient::trigger_pipeline(self, project_id, ref_, token, variables).await
    }

    async fn pipeline(&self, project_id: ProjectId, pipeline_id: PipelineId) -> Result<Pipeline> {
        GitLabClient::pipeline(self, project_id, pipeline_id).await
    }

    async fn pipeline_jobs(
        &self,
        project_id: ProjectId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Job>> {
        GitLabClient::pipeline_jobs(self, project_id, pipeline_id).await
    }

    async fn job_log(&self, project_id: ProjectId, job_id: JobId) -> Result<Vec<u8>> {
        GitLabClient::job_log(self, project_id, job_id).await
    }
}
