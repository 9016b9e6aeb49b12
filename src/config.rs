use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Token;
use crate::error::ConfigError;
use crate::providers::gitlab::types::ProjectId;
use crate::providers::gitlab::{normalize_base_url, ClientOptions};
use crate::trigger::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
pub const DEFAULT_REF: &str = "master";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const CONFIG_DIR_NAME: &str = "gitlab-trigger";
const CONFIG_CANDIDATES: [&str; 4] = [
    "gitlab-trigger.toml",
    "gitlab-trigger.json",
    "gitlab-trigger.yaml",
    "gitlab-trigger.yml",
];

/// Configuration file structure.
///
/// Lets users keep the instance URL, project and common variables out of
/// the command line. Every value can still be overridden by a flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab instance base URL
    pub url: Option<String>,

    /// GitLab personal access token used to read pipelines, jobs and logs
    pub token: Option<String>,

    /// Pipeline trigger token (defaults to `token`)
    pub pipeline_token: Option<String>,

    /// Numeric ID of the project whose pipeline is triggered
    pub project_id: Option<ProjectId>,

    /// Branch or tag to run the pipeline for
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    /// How long to wait for the pipeline, e.g. "30m"; "0" waits forever
    pub timeout: Option<String>,

    /// Delay between two status checks, e.g. "2s"
    pub poll_interval: Option<String>,

    /// Upper bound for a single HTTP request, e.g. "10s"
    pub request_timeout: Option<String>,

    /// Retries for failed read requests
    pub max_retries: Option<u32>,

    /// Print the job summary table at the end of the run
    pub summary: Option<bool>,

    /// Variables passed to the triggered pipeline
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// An explicit path must exist. Otherwise these are searched in order:
    /// 1. `./gitlab-trigger.{toml,json,yaml,yml}`
    /// 2. `<config dir>/gitlab-trigger/gitlab-trigger.{toml,json,yaml,yml}`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        match Self::find() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn find() -> Option<PathBuf> {
        candidates(dirs::config_dir())
            .into_iter()
            .find(|path| path.exists())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

/// Config file locations in search order: the working directory first, then
/// the user's config directory. Both use the same file names.
fn candidates(config_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let global = config_dir.map(|dir| dir.join(CONFIG_DIR_NAME));

    std::iter::once(PathBuf::new())
        .chain(global)
        .flat_map(|dir| CONFIG_CANDIDATES.iter().map(move |name| dir.join(name)))
        .collect()
}

/// Parses durations such as `90`, `90s`, `30m`, `1h30m` or `500ms`.
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(invalid)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}

/// Unvalidated inputs gathered from flags, environment and config file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub project_id: Option<ProjectId>,
    pub user_token: Option<String>,
    pub pipeline_token: Option<String>,
    pub ref_: Option<String>,
    pub url: Option<String>,
    pub variables: BTreeMap<String, String>,
    /// `Some(Duration::ZERO)` disables the timeout.
    pub timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub summary: Option<bool>,
}

impl Settings {
    pub fn from_file(config: &Config) -> std::result::Result<Self, ConfigError> {
        let duration = |raw: &Option<String>| raw.as_deref().map(parse_duration).transpose();

        Ok(Self {
            project_id: config.gitlab.project_id,
            user_token: config.gitlab.token.clone(),
            pipeline_token: config.gitlab.pipeline_token.clone(),
            ref_: config.gitlab.ref_.clone(),
            url: config.gitlab.url.clone(),
            variables: config.trigger.variables.clone(),
            timeout: duration(&config.trigger.timeout)?,
            poll_interval: duration(&config.trigger.poll_interval)?,
            request_timeout: duration(&config.trigger.request_timeout)?,
            max_retries: config.trigger.max_retries,
            summary: config.trigger.summary,
        })
    }

    /// Checks required inputs and fills in defaults.
    ///
    /// # Errors
    /// Returns the first missing or malformed input.
    pub fn validate(self) -> std::result::Result<RunConfig, ConfigError> {
        let project_id = self
            .project_id
            .filter(|id| *id != 0)
            .ok_or(ConfigError::MissingProjectId)?;

        let user_token = self
            .user_token
            .map(Token::from)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingUserToken)?;

        let pipeline_token = self
            .pipeline_token
            .map(Token::from)
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| user_token.clone());

        let ref_ = self.ref_.unwrap_or_else(|| DEFAULT_REF.to_string());
        if ref_.trim().is_empty() {
            return Err(ConfigError::EmptyRef);
        }

        let base_url = normalize_base_url(self.url.as_deref().unwrap_or(DEFAULT_GITLAB_URL))?;

        let timeout = match self.timeout {
            None => Some(DEFAULT_TIMEOUT),
            Some(Duration::ZERO) => None,
            Some(timeout) => Some(timeout),
        };

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        let defaults = ClientOptions::default();
        let client = ClientOptions {
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: defaults.retry_delay,
        };

        Ok(RunConfig {
            project_id,
            ref_,
            user_token,
            pipeline_token,
            variables: self.variables,
            base_url,
            timeout,
            poll_interval,
            client,
            summary: self.summary.unwrap_or(true),
        })
    }
}

/// Validated, immutable input of one trigger run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    project_id: ProjectId,
    ref_: String,
    user_token: Token,
    pipeline_token: Token,
    variables: BTreeMap<String, String>,
    base_url: Url,
    timeout: Option<Duration>,
    poll_interval: Duration,
    client: ClientOptions,
    summary: bool,
}

impl RunConfig {
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn ref_(&self) -> &str {
        &self.ref_
    }

    pub fn user_token(&self) -> &Token {
        &self.user_token
    }

    pub fn pipeline_token(&self) -> &Token {
        &self.pipeline_token
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `None` means wait until the pipeline finishes, however long it takes.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn client_options(&self) -> &ClientOptions {
        &self.client
    }

    pub fn show_summary(&self) -> bool {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn minimal() -> Settings {
        Settings {
            project_id: Some(1234),
            user_token: Some("glpat-user".to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_config_candidates_share_file_names() {
        let paths = candidates(Some(PathBuf::from("/home/ci/.config")));

        assert_eq!(paths.len(), 8);
        assert_eq!(paths[0], PathBuf::from("gitlab-trigger.toml"));
        assert_eq!(paths[3], PathBuf::from("gitlab-trigger.yml"));
        assert_eq!(
            paths[4],
            PathBuf::from("/home/ci/.config/gitlab-trigger/gitlab-trigger.toml")
        );
        assert_eq!(
            paths[7],
            PathBuf::from("/home/ci/.config/gitlab-trigger/gitlab-trigger.yml")
        );
    }

    #[test]
    fn test_config_candidates_without_config_dir() {
        let paths = candidates(None);
        assert_eq!(
            paths,
            CONFIG_CANDIDATES.iter().map(PathBuf::from).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_defaults() {
        let config = minimal().validate().unwrap();
        assert_eq!(config.project_id(), 1234);
        assert_eq!(config.ref_(), "master");
        assert_eq!(config.base_url().as_str(), "https://gitlab.com/");
        assert_eq!(config.timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.client_options(), &ClientOptions::default());
        assert!(config.show_summary());
        assert!(config.variables().is_empty());
    }

    #[test]
    fn test_pipeline_token_falls_back_to_user_token() {
        let config = minimal().validate().unwrap();
        assert_eq!(config.pipeline_token().as_str(), "glpat-user");

        let config = Settings {
            pipeline_token: Some(String::new()),
            ..minimal()
        }
        .validate()
        .unwrap();
        assert_eq!(config.pipeline_token().as_str(), "glpat-user");

        let config = Settings {
            pipeline_token: Some("trigger".to_string()),
            ..minimal()
        }
        .validate()
        .unwrap();
        assert_eq!(config.pipeline_token().as_str(), "trigger");
        assert_eq!(config.user_token().as_str(), "glpat-user");
    }

    #[test]
    fn test_missing_project_id() {
        for project_id in [None, Some(0)] {
            let err = Settings {
                project_id,
                ..minimal()
            }
            .validate()
            .unwrap_err();
            assert_eq!(err, ConfigError::MissingProjectId);
        }
    }

    #[test]
    fn test_missing_user_token() {
        for user_token in [None, Some(String::new()), Some("  ".to_string())] {
            let err = Settings {
                user_token,
                ..minimal()
            }
            .validate()
            .unwrap_err();
            assert_eq!(err, ConfigError::MissingUserToken);
        }
    }

    #[test]
    fn test_empty_ref_is_rejected() {
        let err = Settings {
            ref_: Some(" ".to_string()),
            ..minimal()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::EmptyRef);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = Settings {
            timeout: Some(Duration::ZERO),
            ..minimal()
        }
        .validate()
        .unwrap();
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = Settings {
            poll_interval: Some(Duration::ZERO),
            ..minimal()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::ZeroPollInterval);
    }

    #[test]
    fn test_api_suffix_is_stripped_from_url() {
        let config = Settings {
            url: Some("https://gitlab.example.com/api/v4".to_string()),
            ..minimal()
        }
        .validate()
        .unwrap();
        assert_eq!(config.base_url().as_str(), "https://gitlab.example.com/");
    }

    #[test]
    fn test_malformed_url_is_config_error() {
        let err = Settings {
            url: Some("gitlab.example.com".to_string()),
            ..minimal()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for raw in ["", "m", "10x", "1h30", "-5s", "1.5h", "s10"] {
            assert_eq!(
                parse_duration(raw),
                Err(ConfigError::InvalidDuration(raw.to_string())),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[gitlab]
url = "https://gitlab.example.com"
token = "glpat-test-token"
pipeline-token = "trigger-token"
project-id = 42
ref = "main"

[trigger]
timeout = "1h"
poll-interval = "5s"
max-retries = 1
summary = false

[trigger.variables]
DEPLOY_ENV = "staging"
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.gitlab.project_id, Some(42));
        assert_eq!(config.gitlab.ref_.as_deref(), Some("main"));
        assert_eq!(
            config.gitlab.pipeline_token.as_deref(),
            Some("trigger-token")
        );
        assert_eq!(config.trigger.max_retries, Some(1));
        assert_eq!(
            config.trigger.variables.get("DEPLOY_ENV").map(String::as_str),
            Some("staging")
        );

        let run = Settings::from_file(&config).unwrap().validate().unwrap();
        assert_eq!(run.timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(run.poll_interval(), Duration::from_secs(5));
        assert_eq!(run.client_options().max_retries, 1);
        assert!(!run.show_summary());
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "gitlab": {
    "token": "glpat-json-token",
    "project-id": 7
  },
  "trigger": {
    "variables": { "A": "1" }
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.gitlab.token.as_deref(), Some("glpat-json-token"));
        assert_eq!(config.gitlab.project_id, Some(7));
        assert_eq!(config.trigger.variables.len(), 1);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        let yaml_content = r#"
gitlab:
  url: https://gitlab.yaml.example
  project-id: 9
trigger:
  timeout: "0"
"#;
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(
            config.gitlab.url.as_deref(),
            Some("https://gitlab.yaml.example")
        );
        assert_eq!(config.trigger.timeout.as_deref(), Some("0"));
        let settings = Settings::from_file(&config).unwrap();
        assert_eq!(settings.timeout, Some(Duration::ZERO));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_duration_in_file() {
        let config = Config {
            trigger: TriggerConfig {
                timeout: Some("soon".to_string()),
                ..TriggerConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(
            Settings::from_file(&config).unwrap_err(),
            ConfigError::InvalidDuration("soon".to_string())
        );
    }
}
