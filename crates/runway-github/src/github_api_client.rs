use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use runway_core::{GithubPullRequest, PlatformClient, PullRequest, Repo};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;

use crate::github_transport_helpers::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

pub const GITHUB_COMMENT_MAX_CHARS: usize = 65_000;
const GITHUB_COMMENT_TRUNCATION_NOTICE: &str = "\n\n_(comment truncated)_";

/// Connection settings for [`GithubApiClient`].
#[derive(Debug, Clone)]
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

/// GitHub REST client implementing the platform collaborator.
#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("runway"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-runway-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying github api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl PlatformClient for GithubApiClient {
    async fn get_pull_request(&self, repo: &Repo, number: u64) -> Result<GithubPullRequest> {
        self.request_json("get pull request", || {
            self.http.get(format!(
                "{}/repos/{}/{}/pulls/{}",
                self.api_base, repo.owner, repo.name, number
            ))
        })
        .await
    }

    async fn create_comment(&self, repo: &Repo, pull_number: u64, body: &str) -> Result<()> {
        let payload = json!({ "body": clamp_comment_body(body) });
        let _: IgnoredAny = self
            .request_json("create issue comment", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/{}/comments",
                        self.api_base, repo.owner, repo.name, pull_number
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        state: &str,
        description: &str,
        context: &str,
    ) -> Result<()> {
        let sha = pull.head_commit.trim();
        if sha.is_empty() {
            bail!(
                "cannot update status for {}#{} without a head commit",
                repo.full_name,
                pull.num
            );
        }
        let payload = json!({
            "state": state,
            "description": description,
            "context": context,
        });
        let _: IgnoredAny = self
            .request_json("update commit status", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/statuses/{}",
                        self.api_base, repo.owner, repo.name, sha
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }
}

fn clamp_comment_body(body: &str) -> String {
    if body.chars().count() <= GITHUB_COMMENT_MAX_CHARS {
        return body.to_string();
    }
    let keep = GITHUB_COMMENT_MAX_CHARS - GITHUB_COMMENT_TRUNCATION_NOTICE.chars().count();
    let mut clamped = body.chars().take(keep).collect::<String>();
    clamped.push_str(GITHUB_COMMENT_TRUNCATION_NOTICE);
    clamped
}
