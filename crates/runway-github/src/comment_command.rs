use runway_core::{Command, CommandName};
use thiserror::Error;

pub const DEFAULT_ENVIRONMENT: &str = "default";
pub const COMMENT_COMMAND_USAGE: &str = "Usage: runway <plan|apply|help> [environment] [--verbose]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates reasons a comment addressed to the bot could not be parsed.
pub enum CommentCommandError {
    #[error("{}", COMMENT_COMMAND_USAGE)]
    MissingCommand,
    #[error("unknown command `{0}`. {usage}", usage = COMMENT_COMMAND_USAGE)]
    UnknownCommand(String),
    #[error("unexpected argument `{0}`. {usage}", usage = COMMENT_COMMAND_USAGE)]
    UnexpectedArgument(String),
    #[error("invalid environment `{0}`: use letters, digits, `-`, `_` or `.`")]
    InvalidEnvironment(String),
}

/// Parses `<prefix> <command> [environment] [--verbose]` from a comment body.
///
/// Returns `None` when the comment is not addressed to `command_prefix`.
pub fn parse_comment_command(
    body: &str,
    command_prefix: &str,
) -> Option<Result<Command, CommentCommandError>> {
    let mut tokens = body.split_whitespace();
    let prefix = tokens.next()?;
    if prefix != command_prefix {
        return None;
    }

    let Some(raw_command) = tokens.next() else {
        return Some(Err(CommentCommandError::MissingCommand));
    };
    let Some(name) = CommandName::parse(raw_command) else {
        return Some(Err(CommentCommandError::UnknownCommand(
            raw_command.to_string(),
        )));
    };

    let mut environment = None;
    let mut verbose = false;
    for token in tokens {
        if token == "--verbose" {
            verbose = true;
            continue;
        }
        if token.starts_with('-') || environment.is_some() {
            return Some(Err(CommentCommandError::UnexpectedArgument(
                token.to_string(),
            )));
        }
        if !is_valid_environment(token) {
            return Some(Err(CommentCommandError::InvalidEnvironment(
                token.to_string(),
            )));
        }
        environment = Some(token.to_string());
    }

    Some(Ok(Command::new(
        name,
        environment.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        verbose,
    )))
}

// Environments become a directory name under the workspace root.
fn is_valid_environment(raw: &str) -> bool {
    !raw.starts_with('.')
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
}
