//! Release host access
//!
//! `ReleaseSource` is the one seam between the update engine and the service
//! that stores releases. `GitHubReleases` talks to the GitHub REST API and
//! release download URLs; tests substitute in-memory sources.

use async_trait::async_trait;
use bt_core::retry::{RetryExecutorBuilder, RetryPredicate, Sleeper, TracingObserver};
use bt_core::types::{HostingConfig, NetworkConfig, RetryPolicy};
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::HostError;

/// Releases fetched per page when listing
const PER_PAGE: usize = 100;

/// Upper bound on pages read when listing releases
const MAX_PAGES: usize = 10;

/// Annotated tags can point at other tags; stop following after this many
const MAX_TAG_DEPTH: usize = 4;

/// Release information
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release tag (e.g., "v0.2.0")
    pub tag_name: String,

    /// Release name
    #[serde(default)]
    pub name: Option<String>,

    /// Whether this is a prerelease
    #[serde(default)]
    pub prerelease: bool,

    /// Whether this is a draft
    #[serde(default)]
    pub draft: bool,

    /// Published date
    #[serde(default)]
    pub published_at: Option<String>,
}

/// A versioned object store holding bt releases
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// List published releases, newest first
    async fn list_releases(&self) -> Result<Vec<Release>, HostError>;

    /// Get the release for an exact tag
    async fn get_release(&self, tag: &str) -> Result<Release, HostError>;

    /// Commit SHA that a tag points to, following annotated tags
    async fn resolve_tag(&self, tag: &str) -> Result<String, HostError>;

    /// Download an object attached to a release
    async fn download(&self, tag: &str, name: &str) -> Result<Bytes, HostError>;
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

/// GitHub Releases client
pub struct GitHubReleases {
    client: reqwest::Client,
    hosting: HostingConfig,
    token: Option<String>,
    download_timeout: Duration,
}

impl GitHubReleases {
    /// Create a client from the hosting and network configuration
    ///
    /// The API token is read once from the environment variable named by
    /// `hosting.token_env`.
    pub fn new(hosting: &HostingConfig, network: &NetworkConfig) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .timeout(Duration::from_secs(network.http_timeout_secs))
            .build()
            .map_err(|e| HostError::permanent(format!("failed to create HTTP client: {}", e)))?;

        let token = std::env::var(&hosting.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if token.is_some() {
            debug!("Using API token from {}", hosting.token_env);
        }

        Ok(Self {
            client,
            hosting: hosting.clone(),
            token,
            download_timeout: Duration::from_secs(network.download_timeout_secs),
        })
    }

    fn repo_api_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.hosting.api_url.trim_end_matches('/'),
            self.hosting.repo_owner,
            self.hosting.repo_name,
            path
        )
    }

    fn download_url(&self, tag: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.hosting.download_url.trim_end_matches('/'),
            self.hosting.repo_owner,
            self.hosting.repo_name,
            tag,
            name
        )
    }

    async fn api_get(&self, url: &str, what: &str) -> Result<Response, HostError> {
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        self.check_status(response, what)
    }

    fn check_status(&self, response: Response, what: &str) -> Result<Response, HostError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if is_rate_limited(&response) {
            return Err(HostError::RateLimited {
                token_env: self.hosting.token_env.clone(),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(HostError::not_found(what));
        }

        let message = format!("{} returned HTTP {}", what, status);
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            Err(HostError::transient(message))
        } else {
            Err(HostError::permanent(message))
        }
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn list_releases(&self) -> Result<Vec<Release>, HostError> {
        let mut releases = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.repo_api_url(&format!("releases?per_page={}&page={}", PER_PAGE, page));
            let response = self.api_get(&url, "release list").await?;
            let batch: Vec<Release> = response.json().await.map_err(body_error)?;

            let last_page = batch.len() < PER_PAGE;
            releases.extend(batch);
            if last_page {
                break;
            }
        }

        debug!("Listed {} releases", releases.len());
        Ok(releases)
    }

    async fn get_release(&self, tag: &str) -> Result<Release, HostError> {
        let url = self.repo_api_url(&format!("releases/tags/{}", tag));
        let response = self.api_get(&url, &format!("release {}", tag)).await?;
        response.json().await.map_err(body_error)
    }

    async fn resolve_tag(&self, tag: &str) -> Result<String, HostError> {
        let url = self.repo_api_url(&format!("git/ref/tags/{}", tag));
        let response = self.api_get(&url, &format!("tag {}", tag)).await?;
        let mut object = response.json::<GitRef>().await.map_err(body_error)?.object;

        for _ in 0..MAX_TAG_DEPTH {
            if object.kind != "tag" {
                break;
            }
            debug!("Peeling annotated tag object {}", object.sha);
            let url = self.repo_api_url(&format!("git/tags/{}", object.sha));
            let response = self.api_get(&url, &format!("tag object {}", object.sha)).await?;
            object = response.json::<GitRef>().await.map_err(body_error)?.object;
        }

        if object.kind != "commit" {
            return Err(HostError::permanent(format!(
                "tag {} points to a {} instead of a commit",
                tag, object.kind
            )));
        }

        Ok(object.sha)
    }

    async fn download(&self, tag: &str, name: &str) -> Result<Bytes, HostError> {
        let url = self.download_url(tag, name);
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check_status(response, name)?;

        response.bytes().await.map_err(transport_error)
    }
}

fn is_rate_limited(response: &Response) -> bool {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0"),
        _ => false,
    }
}

fn transport_error(err: reqwest::Error) -> HostError {
    HostError::transient(format!("request failed: {}", err))
}

fn body_error(err: reqwest::Error) -> HostError {
    if err.is_decode() {
        HostError::permanent(format!("unexpected response body: {}", err))
    } else {
        transport_error(err)
    }
}

/// Retries only transient host failures
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly;

impl RetryPredicate<HostError> for TransientOnly {
    fn should_retry(&self, error: &HostError) -> bool {
        error.is_transient()
    }
}

/// Run a host call under a retry policy
pub(crate) async fn with_retry<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    sleeper: &Arc<dyn Sleeper>,
    op: F,
) -> Result<T, HostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .with_predicate(TransientOnly)
        .with_observer(TracingObserver::new(operation))
        .with_sleeper(sleeper.clone())
        .build()
        .execute(op)
        .await
        .map_err(|e| e.into_source())
}
