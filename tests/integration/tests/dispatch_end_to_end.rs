use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use runway_core::{
    Command, CommandContext, CommandExecutor, CommandName, CommandResponse, GithubPullHead,
    GithubPullRepo, GithubPullRequest, GithubPullUser, LockUrlFn, PlanExecutor, PlatformClient,
    PullDataExtractor, PullRequest, PullState, Repo, User,
};
use runway_runtime::{
    CommandDispatcher, CommitStatusReporter, DispatcherCollaborators, FileWorkspace, RunLocker,
    ShellExecutorConfig, TemplateCommentRenderer, UsageHelpExecutor, Workspace,
    WorkspaceShellExecutor, CLOSED_PULL_COMMENT, INTERNAL_BUG_PREFIX,
};
use tempfile::TempDir;

/// In-memory GitHub double serving one pull request whose head is a local repo.
struct ScriptedGithub {
    state: Mutex<String>,
    head_clone_url: String,
    comments: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(String, String)>>,
}

impl ScriptedGithub {
    fn new(head_clone_url: String) -> Self {
        Self {
            state: Mutex::new("open".to_string()),
            head_clone_url,
            comments: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
        }
    }

    fn comments(&self) -> Vec<String> {
        self.comments.lock().expect("comments").clone()
    }

    fn statuses(&self) -> Vec<String> {
        self.statuses
            .lock()
            .expect("statuses")
            .iter()
            .map(|(state, description)| format!("{state}:{description}"))
            .collect()
    }
}

#[async_trait]
impl PlatformClient for ScriptedGithub {
    async fn get_pull_request(&self, repo: &Repo, number: u64) -> Result<GithubPullRequest> {
        Ok(GithubPullRequest {
            number: Some(number),
            state: Some(self.state.lock().expect("state").clone()),
            html_url: Some(format!("https://github.com/{}/pull/{number}", repo.full_name)),
            user: Some(GithubPullUser {
                login: Some("alice".to_string()),
            }),
            head: Some(GithubPullHead {
                branch: Some("feature".to_string()),
                sha: Some("c0ffee".to_string()),
                repo: Some(GithubPullRepo {
                    full_name: Some(repo.full_name.clone()),
                    clone_url: Some(self.head_clone_url.clone()),
                }),
            }),
        })
    }

    async fn create_comment(&self, _repo: &Repo, _pull_number: u64, body: &str) -> Result<()> {
        self.comments
            .lock()
            .expect("comments")
            .push(body.to_string());
        Ok(())
    }

    async fn update_status(
        &self,
        _repo: &Repo,
        pull: &PullRequest,
        state: &str,
        description: &str,
        _context: &str,
    ) -> Result<()> {
        if pull.head_commit.is_empty() {
            bail!("status pushed before the head commit was resolved");
        }
        self.statuses
            .lock()
            .expect("statuses")
            .push((state.to_string(), description.to_string()));
        Ok(())
    }
}

/// Accepts local filesystem clone URLs, which the GitHub extractor rejects.
struct LocalPathExtractor;

impl PullDataExtractor for LocalPathExtractor {
    fn extract_pull_data(&self, pull: &GithubPullRequest) -> Result<(PullRequest, Repo)> {
        let head = pull.head.clone().unwrap_or_default();
        let head_repo = head.repo.unwrap_or_default();
        let full_name = head_repo.full_name.as_deref().unwrap_or_default();
        let Some(mut repo) = Repo::from_full_name(full_name) else {
            bail!("pull request head.repo.full_name is null");
        };
        repo.clone_url = head_repo.clone_url.unwrap_or_default();
        repo.sanitized_clone_url = repo.clone_url.clone();
        Ok((
            PullRequest {
                num: pull.number.unwrap_or_default(),
                head_commit: head.sha.unwrap_or_default(),
                branch: head.branch.unwrap_or_default(),
                url: pull.html_url.clone().unwrap_or_default(),
                author: "alice".to_string(),
                state: PullState::Open,
            },
            repo,
        ))
    }
}

/// Panics on its first call, then delegates.
struct PanicOnceExecutor {
    calls: AtomicUsize,
    inner: Arc<WorkspaceShellExecutor>,
}

#[async_trait]
impl CommandExecutor for PanicOnceExecutor {
    async fn execute(&self, ctx: &CommandContext) -> CommandResponse {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("plan executor crashed mid-run");
        }
        self.inner.execute(ctx).await
    }
}

impl PlanExecutor for PanicOnceExecutor {
    fn set_lock_url(&self, lock_url: LockUrlFn) {
        self.inner.set_lock_url(lock_url);
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args([
            "-c",
            "user.name=runway-test",
            "-c",
            "user.email=runway-test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

struct Fixture {
    temp: TempDir,
    source: PathBuf,
    github: Arc<ScriptedGithub>,
    workspace: Arc<FileWorkspace>,
    locker: RunLocker,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("source");
        std::fs::create_dir_all(&source).expect("source dir");
        git(&source, &["init"]);
        std::fs::write(source.join("README.md"), "base\n").expect("readme");
        git(&source, &["add", "."]);
        git(&source, &["commit", "-m", "base"]);
        git(&source, &["checkout", "-b", "feature"]);
        std::fs::write(source.join("main.tf"), "bucket = \"logs\"\n").expect("main.tf");
        git(&source, &["add", "."]);
        git(&source, &["commit", "-m", "feature"]);

        let github = Arc::new(ScriptedGithub::new(source.display().to_string()));
        let workspace = Arc::new(FileWorkspace::new(temp.path().join("data")));
        Self {
            temp,
            source,
            github,
            workspace,
            locker: RunLocker::new(),
        }
    }

    fn commit_on_feature(&self, remove: &str, add: (&str, &str)) {
        std::fs::remove_file(self.source.join(remove)).expect("remove");
        std::fs::write(self.source.join(add.0), add.1).expect("write");
        git(&self.source, &["add", "-A"]);
        git(&self.source, &["commit", "-m", "update"]);
    }

    fn shell(&self, script: &str) -> ShellExecutorConfig {
        ShellExecutorConfig::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            Vec::new(),
        )
    }

    fn dispatcher_with(
        &self,
        plan_executor: Arc<dyn PlanExecutor>,
        apply_script: &str,
    ) -> CommandDispatcher {
        let workspace: Arc<dyn Workspace> = self.workspace.clone();
        let dispatcher = CommandDispatcher::new(DispatcherCollaborators {
            plan_executor,
            apply_executor: Arc::new(WorkspaceShellExecutor::apply(
                workspace,
                self.shell(apply_script),
            )),
            help_executor: Arc::new(UsageHelpExecutor::new(self.github.clone())),
            client: self.github.clone(),
            extractor: Arc::new(LocalPathExtractor),
            renderer: Arc::new(TemplateCommentRenderer::new().expect("renderer")),
            status: CommitStatusReporter::new(self.github.clone()),
            locker: self.locker.clone(),
        });
        dispatcher.set_lock_url(Arc::new(|id: &str| {
            format!("https://runway.example.com/lock?id={id}")
        }));
        dispatcher
    }

    fn dispatcher(&self, plan_script: &str, apply_script: &str) -> CommandDispatcher {
        let plan = Arc::new(WorkspaceShellExecutor::plan(
            self.workspace.clone(),
            self.shell(plan_script),
        ));
        self.dispatcher_with(plan, apply_script)
    }
}

fn context(name: CommandName, environment: &str) -> CommandContext {
    CommandContext::new(
        Repo::from_full_name("acme/infra").expect("repo"),
        PullRequest::numbered(42),
        User {
            login: "alice".to_string(),
        },
        Command::new(name, environment, false),
    )
}

#[tokio::test]
async fn integration_plan_then_apply_reports_statuses_and_comments() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher(
        "echo \"planning $RUNWAY_ENVIRONMENT\"; cat main.tf > plan.out",
        "cat plan.out",
    );

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;
    dispatcher
        .execute_command(context(CommandName::Apply, "staging"))
        .await;

    assert_eq!(
        fixture.github.statuses(),
        vec![
            "pending:Plan Pending",
            "success:Plan Success",
            "pending:Apply Pending",
            "success:Apply Success",
        ]
    );
    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments[0].contains("planning staging"));
    assert!(comments[0]
        .contains("[here](https://runway.example.com/lock?id=acme/infra/./staging)"));
    assert!(comments[1].contains("bucket = \"logs\""));
    assert_eq!(fixture.locker.held_count(), 0);
}

#[tokio::test]
async fn integration_closed_pull_posts_advisory_without_status_or_lock() {
    let fixture = Fixture::new();
    *fixture.github.state.lock().expect("state") = "closed".to_string();
    let dispatcher = fixture.dispatcher("true", "true");

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;

    assert_eq!(fixture.github.comments(), vec![CLOSED_PULL_COMMENT]);
    assert!(fixture.github.statuses().is_empty());
    assert_eq!(fixture.locker.held_count(), 0);
    assert!(!fixture.temp.path().join("data").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_second_plan_on_locked_environment_is_rejected() {
    let fixture = Fixture::new();
    let release = fixture.temp.path().join("release");
    let script = format!(
        "while [ ! -f '{}' ]; do sleep 0.02; done; echo slow plan done",
        release.display()
    );
    let dispatcher = Arc::new(fixture.dispatcher(&script, "true"));

    let first = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .execute_command(context(CommandName::Plan, "staging"))
                .await
        })
    };
    for _ in 0..500 {
        if fixture.locker.is_locked("acme/infra", "staging", 42) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(fixture.locker.is_locked("acme/infra", "staging", 42));

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;
    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("The staging environment is currently locked"));

    assert!(!fixture.locker.is_locked("acme/infra", "production", 42));

    std::fs::write(&release, "go").expect("release");
    first.await.expect("first plan");

    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments[1].contains("slow plan done"));
    assert_eq!(fixture.locker.held_count(), 0);

    let statuses = fixture.github.statuses();
    assert_eq!(
        statuses.iter().filter(|status| status.starts_with("pending")).count(),
        2
    );
    assert_eq!(
        statuses.iter().filter(|status| *status == "failure:Plan Failure").count(),
        1
    );
}

#[tokio::test]
async fn regression_panicking_plan_releases_lock_and_next_plan_succeeds() {
    let fixture = Fixture::new();
    let plan = Arc::new(PanicOnceExecutor {
        calls: AtomicUsize::new(0),
        inner: Arc::new(WorkspaceShellExecutor::plan(
            fixture.workspace.clone(),
            fixture.shell("ls"),
        )),
    });
    let dispatcher = fixture.dispatcher_with(plan, "true");

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;
    assert_eq!(fixture.locker.held_count(), 0);
    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].starts_with(INTERNAL_BUG_PREFIX));
    assert!(comments[0].contains("plan executor crashed mid-run"));

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;
    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments[1].contains("main.tf"));
    assert_eq!(
        fixture.github.statuses().last().map(String::as_str),
        Some("success:Plan Success")
    );
}

#[tokio::test]
async fn integration_replanning_replaces_workspace_contents() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher("ls", "true");

    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;
    fixture.commit_on_feature("main.tf", ("network.tf", "vpc = true\n"));
    dispatcher
        .execute_command(context(CommandName::Plan, "staging"))
        .await;

    let comments = fixture.github.comments();
    assert!(comments[0].contains("main.tf"));
    assert!(comments[1].contains("network.tf"));
    assert!(!comments[1].contains("main.tf"));
}

#[tokio::test]
async fn functional_help_comments_usage_without_status() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher("true", "true");

    dispatcher
        .execute_command(context(CommandName::Help, "default"))
        .await;

    let comments = fixture.github.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("runway <plan|apply|help>"));
    assert!(fixture.github.statuses().is_empty());
}
