use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::config::{parse_duration, Config, RunConfig, Settings};
use crate::error::ConfigError;
use crate::providers::gitlab::GitLabClient;
use crate::trigger::Trigger;

#[derive(Parser, Debug)]
#[command(name = "gitlab-trigger")]
#[command(
    author,
    version,
    about = "Trigger a GitLab pipeline and stream its job logs until it finishes",
    long_about = None
)]
pub struct Cli {
    /// Numeric ID of the project whose pipeline is triggered
    #[arg(short, long, env = "GITLAB_PROJECT_ID")]
    project_id: Option<u64>,

    /// Personal access token used to read pipelines, jobs and logs
    #[arg(short, long, env = "GITLAB_TOKEN", hide_env_values = true)]
    user_token: Option<String>,

    /// Pipeline trigger token (defaults to the user token)
    #[arg(short = 't', long, env = "GITLAB_TRIGGER_TOKEN", hide_env_values = true)]
    pipeline_token: Option<String>,

    /// Branch or tag to run the pipeline for [default: master]
    #[arg(short, long = "ref")]
    ref_: Option<String>,

    /// GitLab instance base URL [default: https://gitlab.com]
    #[arg(long, env = "GITLAB_URL")]
    url: Option<String>,

    /// Pipeline variable as KEY:VALUE, may be repeated
    #[arg(short, long = "variable", value_name = "KEY:VALUE", value_parser = parse_variable)]
    variables: Vec<(String, String)>,

    /// How long to wait for the pipeline, e.g. 30m or 1h30m; 0 waits forever [default: 30m]
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Delay between two status checks [default: 2s]
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Upper bound for a single HTTP request [default: 10s]
    #[arg(long, value_parser = parse_duration)]
    request_timeout: Option<Duration>,

    /// Retries for failed read requests [default: 3]
    #[arg(long)]
    max_retries: Option<u32>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the job summary table at the end of the run
    #[arg(long, default_value_t = false)]
    no_summary: bool,
}

/// Splits `KEY:VALUE` on the first `:`; the value may contain further colons.
pub fn parse_variable(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once(':') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidVariable(raw.to_string())),
    }
}

impl Cli {
    /// Merges flags over the config file and validates the result.
    ///
    /// Flags (and their environment variables) win over file values;
    /// variables are merged key by key.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or required
    /// inputs are missing.
    pub fn resolve(&self) -> Result<RunConfig> {
        let file = Config::load(self.config.as_deref())?;
        let defaults = Settings::from_file(&file).context("Invalid value in config file")?;

        let mut variables: BTreeMap<String, String> = defaults.variables;
        variables.extend(self.variables.iter().cloned());

        let settings = Settings {
            project_id: self.project_id.or(defaults.project_id),
            user_token: self.user_token.clone().or(defaults.user_token),
            pipeline_token: self.pipeline_token.clone().or(defaults.pipeline_token),
            ref_: self.ref_.clone().or(defaults.ref_),
            url: self.url.clone().or(defaults.url),
            variables,
            timeout: self.timeout.or(defaults.timeout),
            poll_interval: self.poll_interval.or(defaults.poll_interval),
            request_timeout: self.request_timeout.or(defaults.request_timeout),
            max_retries: self.max_retries.or(defaults.max_retries),
            summary: if self.no_summary {
                Some(false)
            } else {
                defaults.summary
            },
        };

        Ok(settings.validate()?)
    }
}

/// Triggers the configured pipeline and streams its logs to stdout.
///
/// # Errors
/// Returns an error if the pipeline cannot be triggered or watched, or if
/// it ends in any status other than success.
pub async fn run(config: RunConfig, cancel: &CancellationToken) -> Result<()> {
    info!(
        "Triggering pipeline of project {} on '{}' at {}",
        config.project_id(),
        config.ref_(),
        config.base_url()
    );
    debug!("Pipeline variables: {:?}", config.variables().keys());

    let client = GitLabClient::new(
        config.base_url(),
        Some(config.user_token().clone()),
        config.client_options().clone(),
    )?;

    let mut trigger = Trigger::new(config, client, io::stdout());
    trigger.run(cancel).await?;

    Ok(())
}
