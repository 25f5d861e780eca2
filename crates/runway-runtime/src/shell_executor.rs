//! Default plan/apply executors running a configured command line per project.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use runway_core::{
    lock_unpoisoned, CommandContext, CommandExecutor, CommandResponse, LockUrlFn, PlanExecutor,
    PlanSuccess, ProjectResult,
};
use tokio::process::Command;

use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommandMode {
    /// Re-clones the workspace before running.
    Plan,
    /// Runs inside the workspace left behind by the last plan.
    Apply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellExecutorConfig {
    pub argv: Vec<String>,
    pub project_dirs: Vec<String>,
}

impl ShellExecutorConfig {
    pub fn new(argv: Vec<String>, project_dirs: Vec<String>) -> Self {
        let project_dirs = if project_dirs.is_empty() {
            vec![".".to_string()]
        } else {
            project_dirs
        };
        Self { argv, project_dirs }
    }
}

/// Runs `argv` in every configured project directory of the workspace.
///
/// A non-zero exit is a project failure carrying the command output. Problems
/// reaching the workspace or spawning the command are errors.
pub struct WorkspaceShellExecutor {
    mode: ShellCommandMode,
    workspace: Arc<dyn Workspace>,
    config: ShellExecutorConfig,
    lock_url: Mutex<Option<LockUrlFn>>,
}

impl WorkspaceShellExecutor {
    pub fn new(
        mode: ShellCommandMode,
        workspace: Arc<dyn Workspace>,
        config: ShellExecutorConfig,
    ) -> Self {
        Self {
            mode,
            workspace,
            config,
            lock_url: Mutex::new(None),
        }
    }

    pub fn plan(workspace: Arc<dyn Workspace>, config: ShellExecutorConfig) -> Self {
        Self::new(ShellCommandMode::Plan, workspace, config)
    }

    pub fn apply(workspace: Arc<dyn Workspace>, config: ShellExecutorConfig) -> Self {
        Self::new(ShellCommandMode::Apply, workspace, config)
    }

    fn lock_url_for(&self, lock_id: &str) -> String {
        match lock_unpoisoned(&self.lock_url).as_ref() {
            Some(lock_url) => lock_url(lock_id),
            None => String::new(),
        }
    }

    async fn run_project(
        &self,
        ctx: &CommandContext,
        root: &Path,
        project_dir: &str,
    ) -> ProjectResult {
        let dir = match resolve_project_dir(root, project_dir) {
            Ok(dir) => dir,
            Err(error) => return ProjectResult::errored(project_dir, error),
        };
        ctx.log
            .info(format!("running {:?} in {:?}", self.config.argv, dir.display()));
        let output = match run_argv(ctx, &self.config.argv, &dir).await {
            Ok(output) => output,
            Err(error) => {
                ctx.log.err(format!("{project_dir}: {error:#}"));
                return ProjectResult::errored(project_dir, error);
            }
        };
        if !output.success {
            ctx.log.warn(format!(
                "{project_dir}: command exited with {}",
                output.exit_label
            ));
            return ProjectResult::failed(
                project_dir,
                format!("command exited with {}\n{}", output.exit_label, output.text),
            );
        }
        ctx.log.debug(format!(
            "{project_dir}: command succeeded with {} bytes of output",
            output.text.len()
        ));
        match self.mode {
            ShellCommandMode::Plan => {
                let lock_id = format!(
                    "{}/{}/{}",
                    ctx.base_repo.full_name, project_dir, ctx.command.environment
                );
                ProjectResult::planned(
                    project_dir,
                    PlanSuccess {
                        output: output.text,
                        lock_url: self.lock_url_for(&lock_id),
                    },
                )
            }
            ShellCommandMode::Apply => ProjectResult::applied(project_dir, output.text),
        }
    }
}

#[async_trait]
impl CommandExecutor for WorkspaceShellExecutor {
    async fn execute(&self, ctx: &CommandContext) -> CommandResponse {
        if self.config.argv.is_empty() {
            return CommandResponse::errored("no command is configured for this executor");
        }
        let root = match self.mode {
            ShellCommandMode::Plan => self.workspace.clone_workspace(ctx).await,
            ShellCommandMode::Apply => self.workspace.get_workspace(ctx).await,
        };
        let root = match root {
            Ok(root) => root,
            Err(error) => {
                let error = anyhow::Error::new(error);
                ctx.log.err(format!("workspace unavailable: {error:#}"));
                return CommandResponse::errored(error);
            }
        };

        let mut results = Vec::with_capacity(self.config.project_dirs.len());
        for project_dir in &self.config.project_dirs {
            results.push(self.run_project(ctx, &root, project_dir).await);
        }
        CommandResponse::from_project_results(results)
    }
}

impl PlanExecutor for WorkspaceShellExecutor {
    fn set_lock_url(&self, lock_url: LockUrlFn) {
        *lock_unpoisoned(&self.lock_url) = Some(lock_url);
    }
}

/// Joins a relative project directory onto the workspace root.
fn resolve_project_dir(root: &Path, project_dir: &str) -> Result<PathBuf> {
    let relative = Path::new(project_dir);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        bail!("project directory {project_dir:?} must stay inside the workspace");
    }
    let dir = root.join(relative);
    if !dir.is_dir() {
        return Err(anyhow!(
            "project directory {project_dir:?} does not exist in the workspace"
        ));
    }
    Ok(dir)
}

struct CommandOutput {
    success: bool,
    exit_label: String,
    text: String,
}

async fn run_argv(ctx: &CommandContext, argv: &[String], dir: &Path) -> Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty command line"))?;
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .env("RUNWAY_REPO", &ctx.base_repo.full_name)
        .env("RUNWAY_PULL_NUM", ctx.pull.num.to_string())
        .env("RUNWAY_HEAD_COMMIT", &ctx.pull.head_commit)
        .env("RUNWAY_ENVIRONMENT", &ctx.command.environment)
        .env("RUNWAY_USER", &ctx.user.login)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program}"))?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let exit_label = match output.status.code() {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    };
    Ok(CommandOutput {
        success: output.status.success(),
        exit_label,
        text: text.trim_end().to_string(),
    })
}
