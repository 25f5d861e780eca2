use std::sync::Arc;

use async_trait::async_trait;
use runway_core::{CommandContext, CommandExecutor, CommandResponse, PlatformClient};
use runway_github::COMMENT_COMMAND_USAGE;

/// Answers `help` by commenting the usage text on the pull request.
pub struct UsageHelpExecutor {
    client: Arc<dyn PlatformClient>,
}

impl UsageHelpExecutor {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }
}

pub fn render_usage_comment() -> String {
    format!(
        "```cmake\n{COMMENT_COMMAND_USAGE}\n\nCommands:\n  plan   Runs plan for the given environment.\n  apply  Runs apply for the plan of the given environment.\n  help   Shows this message.\n\nFlags:\n  --verbose  Appends the command log to the result comment.\n```"
    )
}

#[async_trait]
impl CommandExecutor for UsageHelpExecutor {
    async fn execute(&self, ctx: &CommandContext) -> CommandResponse {
        ctx.log.info("posting usage comment");
        if let Err(error) = self
            .client
            .create_comment(&ctx.base_repo, ctx.pull.num, &render_usage_comment())
            .await
        {
            ctx.log.err(format!("failed to post usage comment: {error:#}"));
            return CommandResponse::errored(error);
        }
        CommandResponse::default()
    }
}
