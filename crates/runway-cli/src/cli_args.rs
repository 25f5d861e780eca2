use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// Program and arguments split with shell quoting rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandLine(pub Vec<String>);

fn parse_command_line(value: &str) -> Result<CommandLine, String> {
    let tokens =
        shell_words::split(value).map_err(|error| format!("invalid command line: {error}"))?;
    if tokens.is_empty() {
        return Err("command line cannot be empty".to_string());
    }
    Ok(CommandLine(tokens))
}

#[derive(Debug, Parser)]
#[command(
    name = "runway",
    about = "Runs infrastructure plan/apply commands from pull-request comments",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "RUNWAY_BIND",
        default_value = "127.0.0.1:4141",
        help = "Address the webhook server listens on"
    )]
    pub bind: String,

    #[arg(
        long = "github-api-base",
        env = "RUNWAY_GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL for the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API calls and for cloning pull-request heads"
    )]
    pub github_token: String,

    #[arg(
        long = "github-user",
        env = "RUNWAY_GITHUB_USER",
        default_value = "x-access-token",
        help = "Username embedded with the token in clone URLs"
    )]
    pub github_user: String,

    #[arg(
        long = "webhook-secret",
        env = "RUNWAY_WEBHOOK_SECRET",
        hide_env_values = true,
        help = "Shared secret verified against x-hub-signature-256 on every delivery"
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long = "data-dir",
        env = "RUNWAY_DATA_DIR",
        default_value = ".runway",
        help = "Directory holding per-pull-request workspaces"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long = "git-binary",
        env = "RUNWAY_GIT_BINARY",
        default_value = "git",
        help = "git executable used to clone and check out pull-request heads"
    )]
    pub git_binary: PathBuf,

    #[arg(
        long = "request-timeout-ms",
        env = "RUNWAY_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single GitHub API request in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "RUNWAY_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for a GitHub API request that fails with 429/5xx or a transport error"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "RUNWAY_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential GitHub API retry backoff in milliseconds"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "status-context",
        env = "RUNWAY_STATUS_CONTEXT",
        default_value = "runway",
        help = "Context label of the commit statuses Runway publishes"
    )]
    pub status_context: String,

    #[arg(
        long = "comment-prefix",
        env = "RUNWAY_COMMENT_PREFIX",
        default_value = "runway",
        help = "First word a pull-request comment must start with to be treated as a command"
    )]
    pub comment_prefix: String,

    #[arg(
        long = "executor-timeout-secs",
        env = "RUNWAY_EXECUTOR_TIMEOUT_SECS",
        value_parser = parse_positive_u64,
        help = "Cancel plan/apply runs that take longer than this many seconds. Unbounded when unset"
    )]
    pub executor_timeout_secs: Option<u64>,

    #[arg(
        long = "plan-command",
        env = "RUNWAY_PLAN_COMMAND",
        default_value = "terraform plan -input=false -no-color",
        value_parser = parse_command_line,
        help = "Command line run in each project directory for `plan`"
    )]
    pub plan_command: CommandLine,

    #[arg(
        long = "apply-command",
        env = "RUNWAY_APPLY_COMMAND",
        default_value = "terraform apply -input=false -no-color -auto-approve",
        value_parser = parse_command_line,
        help = "Command line run in each project directory for `apply`"
    )]
    pub apply_command: CommandLine,

    #[arg(
        long = "project-dir",
        env = "RUNWAY_PROJECT_DIRS",
        value_delimiter = ',',
        help = "Project directories, relative to the repository root, to run commands in. Defaults to the root"
    )]
    pub project_dirs: Vec<String>,

    #[arg(
        long = "lock-url-base",
        env = "RUNWAY_LOCK_URL_BASE",
        help = "Public base URL used to build plan lock links. Defaults to http://<bind>"
    )]
    pub lock_url_base: Option<String>,
}
