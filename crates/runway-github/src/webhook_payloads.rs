use anyhow::{Context, Result};
use runway_core::GithubPullUser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
/// Base repository of a delivery. Clone details come from the pull request.
pub struct WebhookRepository {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WebhookComment {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: GithubPullUser,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WebhookIssue {
    pub number: u64,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

/// `issue_comment` delivery. Pull-request comments arrive as issue comments.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IssueCommentEvent {
    pub action: String,
    pub comment: WebhookComment,
    pub issue: WebhookIssue,
    pub repository: WebhookRepository,
}

impl IssueCommentEvent {
    pub fn is_new_pull_request_comment(&self) -> bool {
        self.action == "created" && self.issue.pull_request.is_some()
    }

    pub fn body(&self) -> &str {
        self.comment.body.as_deref().unwrap_or_default()
    }

    pub fn author(&self) -> &str {
        self.comment.user.login.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
/// `pull_request` delivery; only the fields needed for cleanup are kept.
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub repository: WebhookRepository,
}

impl PullRequestEvent {
    pub fn is_closed(&self) -> bool {
        self.action == "closed"
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Enumerates supported `GithubWebhookEvent` values.
pub enum GithubWebhookEvent {
    IssueComment(IssueCommentEvent),
    PullRequest(PullRequestEvent),
    Ignored { event_name: String },
}

impl GithubWebhookEvent {
    /// Decodes a delivery body according to its `x-github-event` header.
    pub fn parse(event_name: &str, body: &[u8]) -> Result<Self> {
        match event_name.trim() {
            "issue_comment" => serde_json::from_slice(body)
                .map(Self::IssueComment)
                .context("invalid issue_comment payload"),
            "pull_request" => serde_json::from_slice(body)
                .map(Self::PullRequest)
                .context("invalid pull_request payload"),
            other => Ok(Self::Ignored {
                event_name: other.to_string(),
            }),
        }
    }
}
