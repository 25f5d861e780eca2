use std::sync::Arc;

use anyhow::Result;
use runway_core::{
    CommandContext, CommandName, CommandResponse, PlatformClient, PullRequest, Repo, Severity,
};

pub const DEFAULT_STATUS_CONTEXT: &str = "runway";

/// Pushes command outcomes to the commit-status API.
#[derive(Clone)]
pub struct CommitStatusReporter {
    client: Arc<dyn PlatformClient>,
    context: String,
}

impl CommitStatusReporter {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self::with_context(client, DEFAULT_STATUS_CONTEXT)
    }

    pub fn with_context(client: Arc<dyn PlatformClient>, context: impl Into<String>) -> Self {
        Self {
            client,
            context: context.into(),
        }
    }

    pub async fn update(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        severity: Severity,
        command: CommandName,
    ) -> Result<()> {
        self.client
            .update_status(
                repo,
                pull,
                severity.as_str(),
                &status_description(command, severity),
                &self.context,
            )
            .await
    }

    /// Reports the severity `response` reduces to.
    pub async fn update_project_result(
        &self,
        ctx: &CommandContext,
        response: &CommandResponse,
    ) -> Result<()> {
        self.update(
            &ctx.base_repo,
            &ctx.pull,
            response.severity(),
            ctx.command.name,
        )
        .await
    }
}

/// Human description such as `Apply Success`.
pub fn status_description(command: CommandName, severity: Severity) -> String {
    format!("{} {}", command.title(), severity.title())
}
