/// Repository identity as seen by the orchestration runtime.
///
/// `clone_url` may embed credentials; anything user-visible must use
/// `sanitized_clone_url` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repo {
    pub full_name: String,
    pub owner: String,
    pub name: String,
    pub clone_url: String,
    pub sanitized_clone_url: String,
}

impl Repo {
    /// Builds a repo from an `owner/name` slug with no clone information.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        let owner = owner.trim();
        let name = name.trim();
        if !is_repo_segment(owner) || !is_repo_segment(name) {
            return None;
        }
        Some(Self {
            full_name: format!("{owner}/{name}"),
            owner: owner.to_string(),
            name: name.to_string(),
            ..Self::default()
        })
    }
}

/// Owner and repository names become workspace path components, so only
/// the characters GitHub allows are accepted and dot-only names are refused.
fn is_repo_segment(raw: &str) -> bool {
    !raw.is_empty()
        && raw != "."
        && raw != ".."
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullState {
    #[default]
    Open,
    Closed,
}

impl PullState {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("open") {
            Self::Open
        } else {
            Self::Closed
        }
    }
}

/// Pull-request identity and the metadata needed to check it out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    pub num: u64,
    pub head_commit: String,
    pub branch: String,
    pub url: String,
    pub author: String,
    pub state: PullState,
}

impl PullRequest {
    /// Placeholder used before the platform payload has been fetched.
    pub fn numbered(num: u64) -> Self {
        Self {
            num,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub login: String,
}
