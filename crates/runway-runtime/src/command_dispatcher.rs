//! Top-level orchestration of one parsed pull-request command.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use runway_core::{
    CommandContext, CommandExecutor, CommandName, CommandResponse, CommentRenderer, LockUrlFn,
    PlanExecutor, PlatformClient, PullDataExtractor, Severity,
};

use crate::panic_capture::{
    clear_panic_backtrace, install_panic_backtrace_hook, panic_message, take_panic_backtrace,
};
use crate::run_lock::RunLocker;
use crate::status_reporter::CommitStatusReporter;

pub const CLOSED_PULL_COMMENT: &str = "Runway commands can't be run on closed pull requests";
pub const INTERNAL_BUG_PREFIX: &str = "**Error: internal bug.**";

/// Collaborators a [`CommandDispatcher`] is assembled from.
pub struct DispatcherCollaborators {
    pub plan_executor: Arc<dyn PlanExecutor>,
    pub apply_executor: Arc<dyn CommandExecutor>,
    pub help_executor: Arc<dyn CommandExecutor>,
    pub client: Arc<dyn PlatformClient>,
    pub extractor: Arc<dyn PullDataExtractor>,
    pub renderer: Arc<dyn CommentRenderer>,
    pub status: CommitStatusReporter,
    pub locker: RunLocker,
}

/// Routes commands to their executors and reports every outcome back onto
/// the pull request.
pub struct CommandDispatcher {
    plan_executor: Arc<dyn PlanExecutor>,
    apply_executor: Arc<dyn CommandExecutor>,
    help_executor: Arc<dyn CommandExecutor>,
    client: Arc<dyn PlatformClient>,
    extractor: Arc<dyn PullDataExtractor>,
    renderer: Arc<dyn CommentRenderer>,
    status: CommitStatusReporter,
    locker: RunLocker,
    executor_timeout: Option<Duration>,
}

impl CommandDispatcher {
    pub fn new(collaborators: DispatcherCollaborators) -> Self {
        let DispatcherCollaborators {
            plan_executor,
            apply_executor,
            help_executor,
            client,
            extractor,
            renderer,
            status,
            locker,
        } = collaborators;
        Self {
            plan_executor,
            apply_executor,
            help_executor,
            client,
            extractor,
            renderer,
            status,
            locker,
            executor_timeout: None,
        }
    }

    /// Bounds plan/apply executor runs. Unbounded when `None`.
    pub fn with_executor_timeout(mut self, executor_timeout: Option<Duration>) -> Self {
        self.executor_timeout = executor_timeout;
        self
    }

    pub fn executor_timeout(&self) -> Option<Duration> {
        self.executor_timeout
    }

    pub fn locker(&self) -> &RunLocker {
        &self.locker
    }

    pub fn set_lock_url(&self, lock_url: LockUrlFn) {
        self.plan_executor.set_lock_url(lock_url);
    }

    /// Dispatches one command. Outcomes surface only as commit statuses,
    /// pull-request comments and logs; a panic anywhere inside is reported
    /// on the pull request and does not propagate.
    pub async fn execute_command(&self, mut ctx: CommandContext) {
        ctx.rebind_log();
        install_panic_backtrace_hook();
        clear_panic_backtrace();

        let pending_pushed = AtomicBool::new(false);
        let outcome = AssertUnwindSafe(self.dispatch(&mut ctx, &pending_pushed))
            .catch_unwind()
            .await;
        if let Err(payload) = outcome {
            // Same thread as the panic: the unwind was caught within this poll.
            let message = panic_message(payload.as_ref());
            let backtrace =
                take_panic_backtrace().unwrap_or_else(|| "backtrace unavailable".to_string());
            self.report_panic(
                &ctx,
                &message,
                &backtrace,
                pending_pushed.load(Ordering::SeqCst),
            )
            .await;
        }
    }

    async fn dispatch(&self, ctx: &mut CommandContext, pending_pushed: &AtomicBool) {
        let pull = match self
            .client
            .get_pull_request(&ctx.base_repo, ctx.pull.num)
            .await
        {
            Ok(pull) => pull,
            Err(error) => {
                ctx.log
                    .err(format!("making pull request API call to GitHub: {error:#}"));
                return;
            }
        };
        if !pull.is_open() {
            ctx.log.info("command was run on closed pull request");
            if let Err(error) = self
                .client
                .create_comment(&ctx.base_repo, ctx.pull.num, CLOSED_PULL_COMMENT)
                .await
            {
                ctx.log
                    .err(format!("unable to comment on closed pull request: {error:#}"));
            }
            return;
        }

        let (pull, head_repo) = match self.extractor.extract_pull_data(&pull) {
            Ok(extracted) => extracted,
            Err(error) => {
                ctx.log
                    .err(format!("extracting required fields from comment data: {error:#}"));
                return;
            }
        };
        ctx.pull = pull;
        ctx.head_repo = Some(head_repo);

        match ctx.command.name {
            CommandName::Plan => {
                let executor = LockedExecutor::Plan(self.plan_executor.as_ref());
                self.execute_plan_or_apply(ctx, executor, pending_pushed)
                    .await
            }
            CommandName::Apply => {
                let executor = LockedExecutor::Apply(self.apply_executor.as_ref());
                self.execute_plan_or_apply(ctx, executor, pending_pushed)
                    .await
            }
            CommandName::Help => {
                self.help_executor.execute(ctx).await;
            }
        }
    }

    async fn execute_plan_or_apply(
        &self,
        ctx: &CommandContext,
        executor: LockedExecutor<'_>,
        pending_pushed: &AtomicBool,
    ) {
        if let Err(error) = self
            .status
            .update(&ctx.base_repo, &ctx.pull, Severity::Pending, ctx.command.name)
            .await
        {
            ctx.log
                .err(format!("unable to update commit status: {error:#}"));
        }
        pending_pushed.store(true, Ordering::SeqCst);

        // Held through reporting; dropped on every exit path including unwinds.
        let guard = self.locker.try_acquire(
            &ctx.base_repo.full_name,
            &ctx.command.environment,
            ctx.pull.num,
        );
        let response = match guard {
            None => CommandResponse::failed(locked_environment_message(&ctx.command.environment)),
            Some(_) => self.run_executor(ctx, executor).await,
        };
        self.update_pull(ctx, response).await;
        drop(guard);
    }

    async fn run_executor(
        &self,
        ctx: &CommandContext,
        executor: LockedExecutor<'_>,
    ) -> CommandResponse {
        let run = executor.execute(ctx);
        let Some(limit) = self.executor_timeout else {
            return run.await;
        };
        match tokio::time::timeout(limit, run).await {
            Ok(response) => response,
            Err(_) => CommandResponse::errored(format!(
                "{} did not finish within {}s and was cancelled",
                ctx.command.name,
                limit.as_secs_f64()
            )),
        }
    }

    /// Logs, reports status for, and comments on a finished response.
    pub async fn update_pull(&self, ctx: &CommandContext, mut response: CommandResponse) {
        if let Some(error) = response.error.as_deref() {
            ctx.log.err(error);
        } else if let Some(failure) = response.failure.as_deref() {
            ctx.log.warn(failure);
        }

        if let Err(error) = self.status.update_project_result(ctx, &response).await {
            ctx.log
                .err(format!("unable to update commit status: {error:#}"));
        }

        response.command = Some(ctx.command.name);
        let body = self
            .renderer
            .render(&response, &ctx.log.history(), ctx.command.verbose);
        if let Err(error) = self
            .client
            .create_comment(&ctx.base_repo, ctx.pull.num, &body)
            .await
        {
            ctx.log
                .err(format!("unable to comment on pull request: {error:#}"));
        }
    }

    async fn report_panic(
        &self,
        ctx: &CommandContext,
        message: &str,
        backtrace: &str,
        pending_pushed: bool,
    ) {
        let body = format!("{INTERNAL_BUG_PREFIX}\n```\n{message}\n\n{backtrace}\n```");
        ctx.log.err(format!("PANIC: {message}\n{backtrace}"));

        if pending_pushed {
            if let Err(error) = self
                .status
                .update(&ctx.base_repo, &ctx.pull, Severity::Error, ctx.command.name)
                .await
            {
                ctx.log
                    .err(format!("unable to update commit status: {error:#}"));
            }
        }
        if let Err(error) = self
            .client
            .create_comment(&ctx.base_repo, ctx.pull.num, &body)
            .await
        {
            ctx.log
                .err(format!("unable to comment about internal bug: {error:#}"));
        }
    }
}

/// Executors that run under the run lock.
#[derive(Clone, Copy)]
enum LockedExecutor<'a> {
    Plan(&'a dyn PlanExecutor),
    Apply(&'a dyn CommandExecutor),
}

impl LockedExecutor<'_> {
    async fn execute(self, ctx: &CommandContext) -> CommandResponse {
        match self {
            Self::Plan(executor) => executor.execute(ctx).await,
            Self::Apply(executor) => executor.execute(ctx).await,
        }
    }
}

pub fn locked_environment_message(environment: &str) -> String {
    format!(
        "The {environment} environment is currently locked by another command that is running for this pull request. Wait until the previous command is complete and try again."
    )
}
