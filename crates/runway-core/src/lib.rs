//! Foundational types shared across Runway crates.
//!
//! Provides the command/result data model, the per-dispatch command log, and
//! the collaborator traits the orchestration runtime is written against.

pub mod collaborators;
pub mod command;
pub mod command_context;
pub mod command_log;
pub mod command_result;
pub mod pull_payload;
pub mod repo_models;

pub use collaborators::{
    CommandExecutor, CommentRenderer, LockUrlFn, PlanExecutor, PlatformClient, PullDataExtractor,
};
pub use command::{Command, CommandName};
pub use command_context::CommandContext;
pub use command_log::{lock_unpoisoned, CommandLog, CommandLogLevel};
pub use command_result::{worst_severity, CommandResponse, PlanSuccess, ProjectResult, Severity};
pub use pull_payload::{GithubPullHead, GithubPullRepo, GithubPullRequest, GithubPullUser};
pub use repo_models::{PullRequest, PullState, Repo, User};
