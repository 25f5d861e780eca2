//! On-disk workspace lifecycle: one checkout per (repo, pull, environment).

use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use runway_core::{CommandContext, PullRequest, Repo};
use thiserror::Error;
use tokio::process::Command;

const WORKSPACE_PREFIX: &str = "repos";

#[derive(Debug, Error)]
/// Enumerates workspace failures, one variant per lifecycle step.
pub enum WorkspaceError {
    #[error("head repository has not been resolved for this pull request")]
    MissingHeadRepo,
    #[error("refusing unsafe workspace path component {segment:?}")]
    UnsafePath { segment: String },
    #[error("deleting old workspace {path}")]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("creating new workspace {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cloning {url}: {output}")]
    Clone { url: String, output: String },
    #[error("checking out branch {branch}: {output}")]
    Checkout { branch: String, output: String },
    #[error("running git: {0}")]
    Spawn(#[source] io::Error),
    #[error("checking if workspace {path} exists")]
    Missing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("deleting workspace {path}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[async_trait]
/// Trait contract for workspace management.
///
/// `clone_workspace` destroys and rebuilds shared on-disk state and must only
/// be called while the matching run lock is held.
pub trait Workspace: Send + Sync {
    async fn clone_workspace(&self, ctx: &CommandContext) -> Result<PathBuf, WorkspaceError>;

    async fn get_workspace(&self, ctx: &CommandContext) -> Result<PathBuf, WorkspaceError>;

    async fn delete(&self, repo: &Repo, pull: &PullRequest) -> Result<(), WorkspaceError>;
}

/// Workspace rooted at `<data_dir>/repos/<repo>/<pull>/<environment>`.
#[derive(Debug, Clone)]
pub struct FileWorkspace {
    data_dir: PathBuf,
    git_program: PathBuf,
}

impl FileWorkspace {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            git_program: PathBuf::from("git"),
        }
    }

    /// Overrides the git executable used for clone and checkout.
    pub fn with_git_program(mut self, git_program: impl Into<PathBuf>) -> Self {
        self.git_program = git_program.into();
        self
    }

    pub fn repo_pull_dir(
        &self,
        repo: &Repo,
        pull: &PullRequest,
    ) -> Result<PathBuf, WorkspaceError> {
        self.workspace_path(&[&repo.owner, &repo.name, &pull.num.to_string()])
    }

    pub fn clone_dir(&self, ctx: &CommandContext) -> Result<PathBuf, WorkspaceError> {
        let repo = &ctx.base_repo;
        self.workspace_path(&[
            &repo.owner,
            &repo.name,
            &ctx.pull.num.to_string(),
            &ctx.command.environment,
        ])
    }

    /// Joins `segments` under `<data_dir>/repos`. Every segment must be a
    /// plain name so the result never leaves that tree.
    fn workspace_path(&self, segments: &[&str]) -> Result<PathBuf, WorkspaceError> {
        let mut path = self.data_dir.join(WORKSPACE_PREFIX);
        for segment in segments {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => path.push(name),
                _ => {
                    return Err(WorkspaceError::UnsafePath {
                        segment: (*segment).to_string(),
                    })
                }
            }
        }
        Ok(path)
    }

    async fn run_git(
        &self,
        args: &[&str],
        target: Option<&Path>,
        cwd: Option<&Path>,
    ) -> Result<GitOutput, WorkspaceError> {
        let mut command = Command::new(&self.git_program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(target) = target {
            command.arg(target);
        }
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        let output = command.output().await.map_err(WorkspaceError::Spawn)?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(GitOutput {
            success: output.status.success(),
            output: combined.trim().to_string(),
        })
    }
}

#[async_trait]
impl Workspace for FileWorkspace {
    async fn clone_workspace(&self, ctx: &CommandContext) -> Result<PathBuf, WorkspaceError> {
        let head_repo = ctx.head_repo.as_ref().ok_or(WorkspaceError::MissingHeadRepo)?;
        let clone_dir = self.clone_dir(ctx)?;

        // Safe only because plan/apply hold the run lock for this repo/pull/env.
        ctx.log
            .info(format!("cleaning clone directory {:?}", clone_dir.display()));
        match tokio::fs::remove_dir_all(&clone_dir).await {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WorkspaceError::Clean {
                    path: clone_dir,
                    source,
                })
            }
        }

        ctx.log.info(format!("creating dir {:?}", clone_dir.display()));
        tokio::fs::create_dir_all(&clone_dir)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: clone_dir.clone(),
                source,
            })?;

        ctx.log.info(format!(
            "git cloning {:?} into {:?}",
            head_repo.sanitized_clone_url,
            clone_dir.display()
        ));
        let clone = self
            .run_git(
                &["clone", "--", head_repo.clone_url.as_str()],
                Some(clone_dir.as_path()),
                None,
            )
            .await?;
        if !clone.success {
            return Err(WorkspaceError::Clone {
                url: head_repo.sanitized_clone_url.clone(),
                output: clone
                    .output
                    .replace(&head_repo.clone_url, &head_repo.sanitized_clone_url),
            });
        }

        let branch = ctx.pull.branch.trim();
        ctx.log.info(format!("checking out branch {branch:?}"));
        if branch.is_empty() || branch.starts_with('-') {
            return Err(WorkspaceError::Checkout {
                branch: branch.to_string(),
                output: "invalid branch name".to_string(),
            });
        }
        let checkout = self
            .run_git(&["checkout", branch], None, Some(clone_dir.as_path()))
            .await?;
        if !checkout.success {
            return Err(WorkspaceError::Checkout {
                branch: branch.to_string(),
                output: checkout.output,
            });
        }
        Ok(clone_dir)
    }

    async fn get_workspace(&self, ctx: &CommandContext) -> Result<PathBuf, WorkspaceError> {
        let repo_dir = self.clone_dir(ctx)?;
        tokio::fs::metadata(&repo_dir)
            .await
            .map_err(|source| WorkspaceError::Missing {
                path: repo_dir.clone(),
                source,
            })?;
        Ok(repo_dir)
    }

    async fn delete(&self, repo: &Repo, pull: &PullRequest) -> Result<(), WorkspaceError> {
        let path = self.repo_pull_dir(repo, pull)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Delete { path, source }),
        }
    }
}

struct GitOutput {
    success: bool,
    output: String,
}



#[cfg(test)]
mod tests {
    use std::path::Path;

    use runway_core::{Command, CommandContext, CommandName, PullRequest, Repo, User};
    use tempfile::tempdir;

    use super::test_support::{git, init_source_repo};
    use super::{FileWorkspace, Workspace, WorkspaceError};

    fn context_for(source: &Path, environment: &str) -> CommandContext {
        let base_repo = Repo::from_full_name("acme/infra").expect("repo");
        let mut head_repo = base_repo.clone();
        head_repo.clone_url = source.display().to_string();
        head_repo.sanitized_clone_url = head_repo.clone_url.clone();
        let pull = PullRequest {
            num: 7,
            branch: "feature".to_string(),
            head_commit: "abc123".to_string(),
            ..PullRequest::default()
        };
        let mut ctx = CommandContext::new(
            base_repo,
            pull,
            User::default(),
            Command::new(CommandName::Plan, environment, false),
        );
        ctx.head_repo = Some(head_repo);
        ctx
    }

    #[test]
    fn unit_clone_dir_follows_repo_pull_environment_layout() {
        let workspace = FileWorkspace::new("/data");
        let ctx = context_for(Path::new("/unused"), "staging");
        assert_eq!(
            workspace.clone_dir(&ctx).expect("clone dir"),
            Path::new("/data/repos/acme/infra/7/staging")
        );
    }

    #[tokio::test]
    async fn regression_delete_refuses_repo_segments_that_escape_data_dir() {
        let temp = tempdir().expect("tempdir");
        let data_dir = temp.path().join("a").join("data");
        std::fs::create_dir_all(data_dir.join("repos")).expect("repos");
        let outside = temp.path().join("a").join("7");
        std::fs::create_dir_all(&outside).expect("outside");
        std::fs::write(outside.join("precious.txt"), "keep").expect("precious");

        let workspace = FileWorkspace::new(&data_dir);
        let repo = Repo {
            full_name: "../..".to_string(),
            owner: "..".to_string(),
            name: "..".to_string(),
            ..Repo::default()
        };
        let error = workspace
            .delete(&repo, &PullRequest::numbered(7))
            .await
            .expect_err("traversal");
        assert!(matches!(error, WorkspaceError::UnsafePath { .. }));
        assert!(outside.join("precious.txt").exists());
    }

    #[test]
    fn regression_clone_dir_rejects_non_normal_components() {
        let workspace = FileWorkspace::new("/data");
        for environment in ["..", ".", "", "/etc", "a/b"] {
            let ctx = context_for(Path::new("/unused"), environment);
            assert!(
                matches!(
                    workspace.clone_dir(&ctx),
                    Err(WorkspaceError::UnsafePath { .. })
                ),
                "accepted {environment:?}"
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_dropping_clone_kills_running_git() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let marker = temp.path().join("git-finished");
        let fake_git = temp.path().join("slow-git");
        std::fs::write(
            &fake_git,
            format!("#!/bin/sh\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .expect("write fake git");
        std::fs::set_permissions(&fake_git, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let workspace = FileWorkspace::new(temp.path().join("data")).with_git_program(&fake_git);
        let ctx = context_for(&temp.path().join("source"), "staging");
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            workspace.clone_workspace(&ctx),
        )
        .await;
        assert!(outcome.is_err(), "clone should still be running");

        tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
        assert!(!marker.exists(), "git kept running after the clone was dropped");
    }

    #[tokio::test]
    async fn regression_clone_requires_resolved_head_repo() {
        let temp = tempdir().expect("tempdir");
        let workspace = FileWorkspace::new(temp.path());
        let mut ctx = context_for(temp.path(), "staging");
        ctx.head_repo = None;
        let error = workspace.clone_workspace(&ctx).await.expect_err("no head");
        assert!(matches!(error, WorkspaceError::MissingHeadRepo));
    }

    #[tokio::test]
    async fn functional_clone_checks_out_pull_branch() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("source");
        init_source_repo(&source, &[("main.tf", "resource {}\n")]);
        let workspace = FileWorkspace::new(temp.path().join("data"));
        let ctx = context_for(&source, "staging");

        let dir = workspace.clone_workspace(&ctx).await.expect("clone");
        assert_eq!(dir, workspace.clone_dir(&ctx).expect("clone dir"));
        assert_eq!(
            std::fs::read_to_string(dir.join("main.tf")).expect("main.tf"),
            "resource {}\n"
        );
        assert_eq!(workspace.get_workspace(&ctx).await.expect("exists"), dir);
        assert!(ctx.log.history().contains("git cloning"));
    }

    #[tokio::test]
    async fn integration_second_clone_replaces_first_clone_contents() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("source");
        init_source_repo(&source, &[("first.tf", "one\n")]);
        let workspace = FileWorkspace::new(temp.path().join("data"));
        let ctx = context_for(&source, "staging");

        let dir = workspace.clone_workspace(&ctx).await.expect("first clone");
        std::fs::write(dir.join("stray.txt"), "left over").expect("stray");

        std::fs::remove_file(source.join("first.tf")).expect("remove");
        std::fs::write(source.join("second.tf"), "two\n").expect("second");
        git(&source, &["add", "-A"]);
        git(&source, &["commit", "-m", "second"]);

        let dir = workspace.clone_workspace(&ctx).await.expect("second clone");
        assert!(dir.join("second.tf").exists());
        assert!(!dir.join("first.tf").exists());
        assert!(!dir.join("stray.txt").exists());
    }

    #[tokio::test]
    async fn regression_clone_reports_checkout_failure() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("source");
        init_source_repo(&source, &[]);
        let workspace = FileWorkspace::new(temp.path().join("data"));
        let mut ctx = context_for(&source, "staging");
        ctx.pull.branch = "does-not-exist".to_string();

        let error = workspace.clone_workspace(&ctx).await.expect_err("checkout");
        assert!(matches!(error, WorkspaceError::Checkout { .. }));
        assert!(error.to_string().contains("does-not-exist"));
    }

    #[tokio::test]
    async fn regression_clone_reports_clone_failure_with_sanitized_url() {
        let temp = tempdir().expect("tempdir");
        let workspace = FileWorkspace::new(temp.path().join("data"));
        let mut ctx = context_for(&temp.path().join("missing"), "staging");
        if let Some(head) = ctx.head_repo.as_mut() {
            head.sanitized_clone_url = "<sanitized>".to_string();
        }

        let error = workspace.clone_workspace(&ctx).await.expect_err("clone");
        assert!(matches!(error, WorkspaceError::Clone { .. }));
        assert!(error.to_string().starts_with("cloning <sanitized>"));
    }

    #[tokio::test]
    async fn functional_get_workspace_fails_when_absent_and_delete_removes_all_envs() {
        let temp = tempdir().expect("tempdir");
        let workspace = FileWorkspace::new(temp.path());
        let staging = context_for(temp.path(), "staging");
        let production = context_for(temp.path(), "production");

        assert!(matches!(
            workspace.get_workspace(&staging).await,
            Err(WorkspaceError::Missing { .. })
        ));

        std::fs::create_dir_all(workspace.clone_dir(&staging).expect("dir")).expect("staging");
        std::fs::create_dir_all(workspace.clone_dir(&production).expect("dir"))
            .expect("production");
        workspace
            .delete(&staging.base_repo, &staging.pull)
            .await
            .expect("delete");
        assert!(!workspace
            .repo_pull_dir(&staging.base_repo, &staging.pull)
            .expect("pull dir")
            .exists());

        workspace
            .delete(&staging.base_repo, &staging.pull)
            .await
            .expect("delete is idempotent");
    }
}
