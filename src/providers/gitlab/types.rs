use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ProjectId = u64;
pub type PipelineId = u64;
pub type JobId = u64;

/// Lifecycle status shared by GitLab pipelines and jobs.
///
/// Values GitLab may add in the future are kept verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    Unknown(String),
}

impl Status {
    /// Statuses after which a pipeline no longer changes state.
    pub fn is_pipeline_terminal(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Manual | Self::Canceled | Self::Success | Self::Skipped
        )
    }

    /// Statuses after which a job's log is complete.
    ///
    /// `manual` is excluded: a manual job can still be played later.
    pub fn is_job_finished(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Canceled | Self::Skipped
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::WaitingForResource => "waiting_for_resource",
            Self::Preparing => "preparing",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "created" => Self::Created,
            "waiting_for_resource" => Self::WaitingForResource,
            "preparing" => Self::Preparing,
            "pending" => Self::Pending,
            "running" => Self::Running,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            "skipped" => Self::Skipped,
            "manual" => Self::Manual,
            "scheduled" => Self::Scheduled,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GitLab CI/CD pipeline as returned by the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub web_url: String,
    pub status: Status,
    /// Git reference the pipeline runs for (e.g., "master")
    #[serde(rename = "ref", default)]
    pub ref_: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Total pipeline duration in seconds, once known
    #[serde(default)]
    pub duration: Option<u64>,
}

/// A job within a GitLab CI/CD pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub web_url: String,
    pub status: Status,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Job execution duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_pipeline_statuses() {
        for raw in ["failed", "manual", "canceled", "success", "skipped"] {
            assert!(Status::from(raw).is_pipeline_terminal(), "{raw}");
        }
        for raw in [
            "created",
            "waiting_for_resource",
            "preparing",
            "pending",
            "running",
            "scheduled",
            "brand_new_status",
        ] {
            assert!(!Status::from(raw).is_pipeline_terminal(), "{raw}");
        }
    }

    #[test]
    fn test_manual_job_is_not_finished() {
        assert!(!Status::Manual.is_job_finished());
        assert!(Status::Success.is_job_finished());
        assert!(Status::Canceled.is_job_finished());
    }

    #[test]
    fn test_unknown_status_keeps_raw_value() {
        let status = Status::from("paused");
        assert_eq!(status, Status::Unknown("paused".to_string()));
        assert_eq!(status.to_string(), "paused");
    }

    #[test]
    fn test_deserialize_pipeline() {
        let json = r#"{
            "id": 42,
            "iid": 3,
            "project_id": 1,
            "status": "running",
            "ref": "master",
            "sha": "a91957a858320c0e17f3a0eca7cfacbff50ea29a",
            "web_url": "https://gitlab.example.com/group/project/-/pipelines/42",
            "created_at": "2024-05-01T10:00:00.000Z",
            "updated_at": "2024-05-01T10:01:00.000Z",
            "duration": null
        }"#;

        let pipeline: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(pipeline.id, 42);
        assert_eq!(pipeline.status, Status::Running);
        assert_eq!(pipeline.ref_.as_deref(), Some("master"));
        assert!(pipeline.created_at.is_some());
        assert_eq!(pipeline.duration, None);
    }

    #[test]
    fn test_deserialize_job_with_missing_optionals() {
        let json = r#"{
            "id": 7,
            "name": "build",
            "status": "waiting_for_resource",
            "web_url": "https://gitlab.example.com/group/project/-/jobs/7"
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, 7);
        assert_eq!(job.status, Status::WaitingForResource);
        assert_eq!(job.stage, None);
        assert_eq!(job.duration, None);
    }
}
