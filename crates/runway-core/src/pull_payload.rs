use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
/// Public struct `GithubPullUser` used across Runway components.
pub struct GithubPullUser {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
/// Public struct `GithubPullRepo` used across Runway components.
pub struct GithubPullRepo {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
/// Public struct `GithubPullHead` used across Runway components.
pub struct GithubPullHead {
    #[serde(default, rename = "ref")]
    pub branch: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub repo: Option<GithubPullRepo>,
}

/// Raw pull-request payload as returned by the platform API.
///
/// Every field is optional; required fields are validated by a
/// `PullDataExtractor`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GithubPullRequest {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub user: Option<GithubPullUser>,
    #[serde(default)]
    pub head: Option<GithubPullHead>,
}

impl GithubPullRequest {
    pub fn state_str(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.state_str() == "open"
    }
}
