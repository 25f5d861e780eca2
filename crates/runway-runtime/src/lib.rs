//! Orchestration runtime for Runway.
//!
//! Hosts the run lock, workspace lifecycle, status reporting and the command
//! dispatcher, plus the default executors, comment renderer and webhook
//! ingress that turn them into a service.

pub mod command_dispatcher;
pub mod comment_renderer;
pub mod help_executor;
pub mod panic_capture;
pub mod run_lock;
pub mod shell_executor;
pub mod status_reporter;
pub mod webhook_server;
pub mod workspace;

pub use command_dispatcher::{
    locked_environment_message, CommandDispatcher, DispatcherCollaborators, CLOSED_PULL_COMMENT,
    INTERNAL_BUG_PREFIX,
};
pub use comment_renderer::TemplateCommentRenderer;
pub use help_executor::{render_usage_comment, UsageHelpExecutor};
pub use run_lock::{RunLockGuard, RunLockKey, RunLocker};
pub use shell_executor::{ShellCommandMode, ShellExecutorConfig, WorkspaceShellExecutor};
pub use status_reporter::{status_description, CommitStatusReporter, DEFAULT_STATUS_CONTEXT};
pub use webhook_server::{
    build_webhook_router, run_webhook_server, WebhookServerConfig, WebhookServerState,
    DEFAULT_COMMENT_PREFIX,
};
pub use workspace::{FileWorkspace, Workspace, WorkspaceError};
