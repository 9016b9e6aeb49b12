use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::providers::gitlab::types::Status;

/// Errors raised while talking to the GitLab REST API.
#[derive(Error, Debug)]
pub enum GitLabError {
    #[error("{0}")]
    Client(String),

    #[error("Request to {url} failed: {source}")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitLab API returned {status} for {url}: {message}")]
    Api {
        url: Url,
        status: u16,
        message: String,
    },

    #[error("GitLab API returned {status} for {url} after {retries} retries")]
    ApiAfterRetries { url: Url, status: u16, retries: u32 },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, GitLabError>;

/// Invalid or missing input, detected before any remote call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Project ID is empty")]
    MissingProjectId,

    #[error("User token is empty")]
    MissingUserToken,

    #[error("Ref is empty")]
    EmptyRef,

    #[error("Invalid variable '{0}': key value pair should be split with ':'")]
    InvalidVariable(String),

    #[error("Invalid duration '{0}': expected e.g. 90s, 30m, 1h30m or 0")]
    InvalidDuration(String),

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Failed to set {url} as base url: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Failures of a single trigger-and-wait run.
///
/// Every variant names the pipeline or job involved so the failure can be
/// acted on without querying GitLab again.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to trigger project pipeline for project {project_id}")]
    Trigger {
        project_id: u64,
        #[source]
        source: GitLabError,
    },

    #[error("Failed to check status of pipeline {web_url}")]
    PipelineStatus {
        web_url: String,
        #[source]
        source: GitLabError,
    },

    #[error("Failed to list jobs of pipeline {web_url}")]
    ListJobs {
        web_url: String,
        #[source]
        source: GitLabError,
    },

    #[error("Failed to fetch log of job '{name}' ({web_url})")]
    JobLog {
        name: String,
        web_url: String,
        #[source]
        source: GitLabError,
    },

    #[error("Failed to output progress of pipeline {web_url}")]
    Progress {
        web_url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to output log of job '{name}' ({web_url})")]
    Output {
        name: String,
        web_url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {timeout:?} waiting for pipeline {web_url} to finish")]
    TimedOut { web_url: String, timeout: Duration },

    /// The trigger request may already have reached GitLab, so a pipeline
    /// can exist even though none was reported back.
    #[error("Cancelled while triggering a pipeline of project {project_id}")]
    CancelledWhileTriggering { project_id: u64 },

    #[error("Cancelled while waiting for pipeline {web_url}")]
    Cancelled { web_url: String },

    #[error("Pipeline {web_url} failed with status '{status}'")]
    PipelineFailed { web_url: String, status: Status },
}

impl RunError {
    /// Whether the run ended because the deadline elapsed, as opposed to the
    /// pipeline reaching a failing status.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}
