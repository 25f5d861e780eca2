use crate::command::Command;
use crate::command_log::CommandLog;
use crate::repo_models::{PullRequest, Repo, User};

/// Mutable per-dispatch record.
///
/// Created once per inbound command and moved into the task that dispatches
/// it; never shared between dispatches.
#[derive(Debug)]
pub struct CommandContext {
    pub base_repo: Repo,
    /// Resolved from the platform API during dispatch; `None` before that.
    pub head_repo: Option<Repo>,
    pub pull: PullRequest,
    pub user: User,
    pub command: Command,
    pub log: CommandLog,
}

impl CommandContext {
    pub fn new(base_repo: Repo, pull: PullRequest, user: User, command: Command) -> Self {
        let log = CommandLog::new(log_source(&base_repo, &pull));
        Self {
            base_repo,
            head_repo: None,
            pull,
            user,
            command,
            log,
        }
    }

    /// Rebinds the request log to `<repo>/pull/<num>`, dropping prior history.
    pub fn rebind_log(&mut self) {
        self.log = CommandLog::new(log_source(&self.base_repo, &self.pull));
    }
}

fn log_source(repo: &Repo, pull: &PullRequest) -> String {
    format!("{}/pull/{}", repo.full_name, pull.num)
}
