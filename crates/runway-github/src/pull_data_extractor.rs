use anyhow::{anyhow, bail, Context, Result};
use runway_core::{GithubPullRequest, PullDataExtractor, PullRequest, PullState, Repo};

const REDACTED_TOKEN: &str = "<redacted>";

/// Validates raw GitHub pull payloads and builds clone-ready repo values.
///
/// When credentials are configured they are embedded into `clone_url` so
/// private repositories can be cloned; `sanitized_clone_url` carries the
/// same URL with the token redacted.
#[derive(Debug, Clone, Default)]
pub struct GithubPullDataExtractor {
    clone_user: Option<String>,
    clone_token: Option<String>,
}

impl GithubPullDataExtractor {
    pub fn new(clone_user: Option<String>, clone_token: Option<String>) -> Self {
        Self {
            clone_user: clone_user.filter(|value| !value.trim().is_empty()),
            clone_token: clone_token.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Builds a repo from its full name and public clone URL.
    pub fn build_repo(&self, full_name: &str, clone_url: &str) -> Result<Repo> {
        let mut repo = Repo::from_full_name(full_name)
            .ok_or_else(|| anyhow!("invalid repository full name '{full_name}'"))?;
        let parsed = reqwest::Url::parse(clone_url.trim())
            .with_context(|| format!("invalid clone url for {full_name}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("clone url for {full_name} must use http or https");
        }

        let (Some(user), Some(token)) = (self.clone_user.as_deref(), self.clone_token.as_deref())
        else {
            repo.clone_url = parsed.to_string();
            repo.sanitized_clone_url = parsed.to_string();
            return Ok(repo);
        };

        let mut authenticated = parsed.clone();
        authenticated
            .set_username(user.trim())
            .map_err(|_| anyhow!("cannot embed credentials in clone url for {full_name}"))?;
        authenticated
            .set_password(Some(token.trim()))
            .map_err(|_| anyhow!("cannot embed credentials in clone url for {full_name}"))?;
        repo.clone_url = authenticated.to_string();
        repo.sanitized_clone_url = repo.clone_url.replace(token.trim(), REDACTED_TOKEN);
        Ok(repo)
    }
}

impl PullDataExtractor for GithubPullDataExtractor {
    fn extract_pull_data(&self, pull: &GithubPullRequest) -> Result<(PullRequest, Repo)> {
        let number = pull.number.ok_or_else(|| anyhow!("pull request number is null"))?;
        let url = required(pull.html_url.as_deref(), "html_url")?;
        let author = required(
            pull.user.as_ref().and_then(|user| user.login.as_deref()),
            "user.login",
        )?;
        let head = pull
            .head
            .as_ref()
            .ok_or_else(|| anyhow!("pull request head is null"))?;
        let head_commit = required(head.sha.as_deref(), "head.sha")?;
        let branch = required(head.branch.as_deref(), "head.ref")?;
        let head_repo = head
            .repo
            .as_ref()
            .ok_or_else(|| anyhow!("pull request head.repo is null"))?;
        let head_full_name = required(head_repo.full_name.as_deref(), "head.repo.full_name")?;
        let head_clone_url = required(head_repo.clone_url.as_deref(), "head.repo.clone_url")?;

        let repo = self
            .build_repo(head_full_name, head_clone_url)
            .context("extracting head repository")?;
        let pull = PullRequest {
            num: number,
            head_commit: head_commit.to_string(),
            branch: branch.to_string(),
            url: url.to_string(),
            author: author.to_string(),
            state: PullState::parse(pull.state_str()),
        };
        Ok((pull, repo))
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("pull request {field} is null"),
    }
}
