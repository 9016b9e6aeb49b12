use log::debug;
use reqwest::StatusCode;

use super::core::{GitLabClient, PAGE_SIZE};
use crate::error::{GitLabError, Result};
use crate::providers::gitlab::types::{Job, JobId, PipelineId, ProjectId};

const NEXT_PAGE_HEADER: &str = "x-next-page";

impl GitLabClient {
    /// Lists every job of a pipeline, following `x-next-page` until GitLab
    /// reports no further page.
    pub async fn pipeline_jobs(
        &self,
        project_id: ProjectId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Job>> {
        let mut all_jobs = Vec::new();
        let mut page = 1usize;

        loop {
            let mut url =
                self.endpoint(&format!("projects/{project_id}/pipelines/{pipeline_id}/jobs"))?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response = self.get(&url).await?;
            let response = Self::check_status(&url, response).await?;

            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<usize>().ok());

            let jobs: Vec<Job> = response.json().await.map_err(|source| GitLabError::Decode {
                url: url.clone(),
                source,
            })?;
            all_jobs.extend(jobs);

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(all_jobs)
    }

    /// Downloads the full log (trace) of a job.
    ///
    /// GitLab answers 404 for jobs that have not produced a trace yet; that
    /// is reported as an empty log rather than an error.
    pub async fn job_log(&self, project_id: ProjectId, job_id: JobId) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("projects/{project_id}/jobs/{job_id}/trace"))?;

        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No trace yet for job {job_id}");
            return Ok(Vec::new());
        }
        let response = Self::check_status(&url, response).await?;

        let content = response
            .bytes()
            .await
            .map_err(|source| GitLabError::Network {
                url: url.clone(),
                source,
            })?;

        Ok(content.to_vec())
    }
}
