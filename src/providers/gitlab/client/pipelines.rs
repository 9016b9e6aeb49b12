use std::collections::BTreeMap;

use log::{debug, info};

use super::core::GitLabClient;
use crate::auth::Token;
use crate::error::{GitLabError, Result};
use crate::providers::gitlab::types::{Pipeline, PipelineId, ProjectId};

impl GitLabClient {
    /// Creates a pipeline through the trigger endpoint.
    ///
    /// The trigger token travels in the form body, so no user credential is
    /// attached. This request is sent exactly once: retrying a POST here
    /// could start the downstream pipeline twice.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent, GitLab rejects the
    /// trigger, or the response is not a pipeline.
    pub async fn trigger_pipeline(
        &self,
        project_id: ProjectId,
        ref_: &str,
        token: &Token,
        variables: &BTreeMap<String, String>,
    ) -> Result<Pipeline> {
        let url = self.endpoint(&format!("projects/{project_id}/trigger/pipeline"))?;

        let mut form = vec![
            ("token".to_string(), token.as_str().to_string()),
            ("ref".to_string(), ref_.to_string()),
        ];
        form.extend(
            variables
                .iter()
                .map(|(key, value)| (format!("variables[{key}]"), value.clone())),
        );

        debug!("POST {url} ({} variables)", variables.len());
        let response = self
            .client()
            .post(url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| GitLabError::Network {
                url: url.clone(),
                source,
            })?;
        let response = Self::check_status(&url, response).await?;

        let pipeline: Pipeline = response.json().await.map_err(|source| GitLabError::Decode {
            url: url.clone(),
            source,
        })?;

        info!("Triggered pipeline {} on ref {ref_}", pipeline.id);
        Ok(pipeline)
    }

    /// Fetches the current state of a single pipeline.
    pub async fn pipeline(&self, project_id: ProjectId, pipeline_id: PipelineId) -> Result<Pipeline> {
        let url = self.endpoint(&format!("projects/{project_id}/pipelines/{pipeline_id}"))?;
        self.get_json(&url).await
    }
}
