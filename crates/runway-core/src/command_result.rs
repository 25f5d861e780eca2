use std::fmt;

use crate::command::CommandName;

/// Outcome severity reported as a commit status.
///
/// Variant order is the reduction order: the reported severity of a response
/// is the maximum over all of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Pending,
    Success,
    Failure,
    Error,
}

impl Severity {
    /// Returns the commit-status state token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the worst severity in `severities`, or `Success` when empty.
pub fn worst_severity<I>(severities: I) -> Severity
where
    I: IntoIterator<Item = Severity>,
{
    severities
        .into_iter()
        .fold(Severity::Success, |worst, severity| worst.max(severity))
}

/// Successful plan output for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSuccess {
    pub output: String,
    pub lock_url: String,
}

/// Outcome of running a command against one project directory.
///
/// `error` marks an unexpected internal failure, `failure` an expected one
/// the user can act on. At most one of the four outcome fields is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectResult {
    pub path: String,
    pub error: Option<String>,
    pub failure: Option<String>,
    pub plan_success: Option<PlanSuccess>,
    pub apply_success: Option<String>,
}

impl ProjectResult {
    pub fn errored(path: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            error: Some(format!("{error:#}")),
            ..Self::default()
        }
    }

    pub fn failed(path: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            failure: Some(failure.into()),
            ..Self::default()
        }
    }

    pub fn planned(path: impl Into<String>, plan: PlanSuccess) -> Self {
        Self {
            path: path.into(),
            plan_success: Some(plan),
            ..Self::default()
        }
    }

    pub fn applied(path: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            apply_success: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Severity {
        if self.error.is_some() {
            Severity::Error
        } else if self.failure.is_some() {
            Severity::Failure
        } else {
            Severity::Success
        }
    }
}

/// Outcome of one full command across all of its projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    pub error: Option<String>,
    pub failure: Option<String>,
    pub project_results: Vec<ProjectResult>,
    pub command: Option<CommandName>,
}

impl CommandResponse {
    /// Top-level internal error that stopped the command before project work.
    pub fn errored(error: impl fmt::Display) -> Self {
        Self {
            error: Some(format!("{error:#}")),
            ..Self::default()
        }
    }

    /// Top-level expected failure that stopped the command before project work.
    pub fn failed(failure: impl Into<String>) -> Self {
        Self {
            failure: Some(failure.into()),
            ..Self::default()
        }
    }

    pub fn from_project_results(project_results: Vec<ProjectResult>) -> Self {
        Self {
            project_results,
            ..Self::default()
        }
    }

    /// Reduces the response to the single severity shown on the pull request.
    pub fn severity(&self) -> Severity {
        if self.error.is_some() {
            return Severity::Error;
        }
        if self.failure.is_some() {
            return Severity::Failure;
        }
        worst_severity(self.project_results.iter().map(ProjectResult::status))
    }
}
