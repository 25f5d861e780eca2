//! GitHub integration for Runway.
//! This crate provides the REST client used as the platform collaborator,
//! pull-request data extraction, comment-command parsing, and webhook
//! payload/signature handling consumed by the runtime crate.

pub mod comment_command;
pub mod github_api_client;
pub mod github_transport_helpers;
pub mod pull_data_extractor;
pub mod webhook_payloads;
pub mod webhook_signature;

pub use comment_command::{parse_comment_command, CommentCommandError, COMMENT_COMMAND_USAGE};
pub use github_api_client::{GithubApiClient, GithubApiClientConfig, GITHUB_COMMENT_MAX_CHARS};
pub use pull_data_extractor::GithubPullDataExtractor;
pub use webhook_payloads::{GithubWebhookEvent, IssueCommentEvent, PullRequestEvent};
pub use webhook_signature::verify_sha256_hmac_signature;
