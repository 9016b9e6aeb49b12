use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{ConfigError, GitLabError, Result};

const USER_AGENT: &str = concat!("gitlab-trigger/", env!("CARGO_PKG_VERSION"));
const API_PATH: &str = "api/v4/";
pub(super) const PAGE_SIZE: usize = 100;

/// Transport settings for [`GitLabClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound for a single HTTP request, independent of how long the
    /// pipeline is waited on.
    pub request_timeout: Duration,
    /// How many times an idempotent request is retried on connection
    /// errors, 429 and 5xx responses.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
    options: ClientOptions,
}

/// Parses a GitLab base URL, dropping a trailing `/api/v4` if the user
/// passed the API root instead of the instance root.
///
/// The returned URL always ends with `/` so that API paths can be joined
/// onto instances served under a relative root (e.g. `https://host/gitlab`).
pub fn normalize_base_url(raw: &str) -> std::result::Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api/v4").unwrap_or(trimmed);

    let mut url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

impl GitLabClient {
    pub fn new(base_url: &Url, token: Option<Token>, options: ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| GitLabError::Client(format!("Failed to create HTTP client: {e}")))?;

        let api_url = base_url
            .join(API_PATH)
            .map_err(|e| GitLabError::Client(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
            options,
        })
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Resolves a path relative to the `api/v4/` root.
    pub(super) fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| GitLabError::Client(format!("Invalid API path '{path}': {e}")))
    }

    /// Sends an authenticated GET, retrying a bounded number of times on
    /// network errors and rate limits / server errors.
    ///
    /// The returned response may still carry a non-success status; callers
    /// pass it through [`Self::check_status`] unless they handle specific
    /// statuses themselves.
    pub(super) async fn get(&self, url: &Url) -> Result<Response> {
        let max_retries = self.options.max_retries;
        let mut retry_count = 0;

        loop {
            debug!("GET {url}");
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if (e.is_connect() || e.is_timeout()) && retry_count < max_retries => {
                    warn!(
                        "Network error ({e}), retrying in {:?} ({}/{max_retries})...",
                        self.options.retry_delay,
                        retry_count + 1,
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(source) => {
                    return Err(GitLabError::Network {
                        url: url.clone(),
                        source,
                    })
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= max_retries {
                    if retry_count == 0 {
                        return Self::check_status(url, response).await;
                    }
                    return Err(GitLabError::ApiAfterRetries {
                        url: url.clone(),
                        status: status.as_u16(),
                        retries: retry_count,
                    });
                }

                warn!(
                    "GitLab API error (status {status}). Waiting {:?} before retry {}/{max_retries}...",
                    self.options.retry_delay,
                    retry_count + 1,
                );
                tokio::time::sleep(self.options.retry_delay).await;
                retry_count += 1;
                continue;
            }

            return Ok(response);
        }
    }

    pub(super) async fn get_json<T>(&self, url: &Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.get(url).await?;
        let response = Self::check_status(url, response).await?;

        response.json().await.map_err(|source| GitLabError::Decode {
            url: url.clone(),
            source,
        })
    }

    /// Turns a non-success response into [`GitLabError::Api`], keeping the
    /// response body as the message.
    pub(super) async fn check_status(url: &Url, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(GitLabError::Api {
            url: url.clone(),
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_instance_root() {
        let url = normalize_base_url("https://gitlab.com").unwrap();
        assert_eq!(url.as_str(), "https://gitlab.com/");
    }

    #[test]
    fn test_normalize_strips_api_suffix() {
        for raw in [
            "https://gitlab.example.com/api/v4",
            "https://gitlab.example.com/api/v4/",
            "https://gitlab.example.com/",
        ] {
            let url = normalize_base_url(raw).unwrap();
            assert_eq!(url.as_str(), "https://gitlab.example.com/", "{raw}");
        }
    }

    #[test]
    fn test_normalize_relative_root() {
        let url = normalize_base_url("https://example.com/gitlab/api/v4").unwrap();
        assert_eq!(url.as_str(), "https://example.com/gitlab/");

        let client = GitLabClient::new(&url, None, ClientOptions::default()).unwrap();
        let endpoint = client.endpoint("projects/1/pipelines/42").unwrap();
        assert_eq!(
            endpoint.as_str(),
            "https://example.com/gitlab/api/v4/projects/1/pipelines/42"
        );
    }

    #[test]
    fn test_normalize_rejects_malformed_url() {
        let err = normalize_base_url("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
        assert!(err.to_string().contains("not a url"));

        assert!(normalize_base_url("mailto:ops@example.com").is_err());
        assert!(normalize_base_url("ftp://example.com").is_err());
    }
}
