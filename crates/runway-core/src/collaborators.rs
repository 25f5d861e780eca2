//! Trait seams between the orchestration runtime and its collaborators.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::command_context::CommandContext;
use crate::command_result::CommandResponse;
use crate::pull_payload::GithubPullRequest;
use crate::repo_models::{PullRequest, Repo};

/// Builds a user-facing URL for a lock id.
pub type LockUrlFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[async_trait]
/// Trait contract for the code-review platform API.
pub trait PlatformClient: Send + Sync {
    async fn get_pull_request(&self, repo: &Repo, number: u64) -> Result<GithubPullRequest>;

    async fn create_comment(&self, repo: &Repo, pull_number: u64, body: &str) -> Result<()>;

    async fn update_status(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        state: &str,
        description: &str,
        context: &str,
    ) -> Result<()>;
}

/// Extracts canonical pull-request and head-repository data from a payload.
pub trait PullDataExtractor: Send + Sync {
    fn extract_pull_data(&self, pull: &GithubPullRequest) -> Result<(PullRequest, Repo)>;
}

#[async_trait]
/// Trait contract for `CommandExecutor` behavior.
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, ctx: &CommandContext) -> CommandResponse;
}

/// Plan executors additionally render lock links into their output.
pub trait PlanExecutor: CommandExecutor {
    fn set_lock_url(&self, lock_url: LockUrlFn);
}

/// Renders the pull-request comment for a finished command.
pub trait CommentRenderer: Send + Sync {
    fn render(&self, response: &CommandResponse, log_history: &str, verbose: bool) -> String;
}
