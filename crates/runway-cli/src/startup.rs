use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use runway_core::{LockUrlFn, PlatformClient};
use runway_github::{GithubApiClient, GithubApiClientConfig, GithubPullDataExtractor};
use runway_runtime::{
    run_webhook_server, CommandDispatcher, CommitStatusReporter, DispatcherCollaborators,
    FileWorkspace, RunLocker, ShellExecutorConfig, TemplateCommentRenderer, UsageHelpExecutor,
    WebhookServerConfig, WebhookServerState, Workspace, WorkspaceShellExecutor,
};

use crate::cli_args::Cli;

pub(crate) async fn run_server(cli: Cli) -> Result<()> {
    let state = build_server_state(&cli)?;
    run_webhook_server(state).await
}

/// Wires the GitHub client, workspace, executors and dispatcher from `cli`.
pub(crate) fn build_server_state(cli: &Cli) -> Result<Arc<WebhookServerState>> {
    std::fs::create_dir_all(&cli.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            cli.data_dir.display()
        )
    })?;

    let client: Arc<dyn PlatformClient> = Arc::new(
        GithubApiClient::new(GithubApiClientConfig {
            api_base: cli.github_api_base.clone(),
            token: cli.github_token.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
        .context("failed to build github api client")?,
    );
    let workspace: Arc<dyn Workspace> = Arc::new(
        FileWorkspace::new(cli.data_dir.clone()).with_git_program(cli.git_binary.clone()),
    );

    let plan_executor = Arc::new(WorkspaceShellExecutor::plan(
        workspace.clone(),
        ShellExecutorConfig::new(cli.plan_command.0.clone(), cli.project_dirs.clone()),
    ));
    let apply_executor = Arc::new(WorkspaceShellExecutor::apply(
        workspace.clone(),
        ShellExecutorConfig::new(cli.apply_command.0.clone(), cli.project_dirs.clone()),
    ));
    let dispatcher = CommandDispatcher::new(DispatcherCollaborators {
        plan_executor,
        apply_executor,
        help_executor: Arc::new(UsageHelpExecutor::new(client.clone())),
        client: client.clone(),
        extractor: Arc::new(GithubPullDataExtractor::new(
            Some(cli.github_user.clone()),
            Some(cli.github_token.clone()),
        )),
        renderer: Arc::new(TemplateCommentRenderer::new()?),
        status: CommitStatusReporter::with_context(client.clone(), cli.status_context.clone()),
        locker: RunLocker::new(),
    })
    .with_executor_timeout(cli.executor_timeout_secs.map(Duration::from_secs));

    let lock_url_base = cli
        .lock_url_base
        .clone()
        .unwrap_or_else(|| format!("http://{}", cli.bind));
    dispatcher.set_lock_url(lock_url_fn(&lock_url_base)?);

    tracing::info!(
        data_dir = %cli.data_dir.display(),
        status_context = %cli.status_context,
        executor_timeout_secs = ?cli.executor_timeout_secs,
        "runway configured"
    );
    Ok(Arc::new(WebhookServerState {
        config: WebhookServerConfig {
            bind: cli.bind.clone(),
            webhook_secret: cli.webhook_secret.clone(),
            comment_prefix: cli.comment_prefix.clone(),
        },
        dispatcher: Arc::new(dispatcher),
        client,
        workspace,
    }))
}

/// Builds `<base>/lock?id=<lock id>` links.
pub(crate) fn lock_url_fn(base: &str) -> Result<LockUrlFn> {
    let endpoint = reqwest::Url::parse(&format!("{}/lock", base.trim().trim_end_matches('/')))
        .with_context(|| format!("invalid lock url base {base:?}"))?;
    Ok(Arc::new(move |lock_id: &str| {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("id", lock_id);
        url.to_string()
    }))
}
