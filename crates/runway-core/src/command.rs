use std::fmt;

/// Enumerates the commands a pull-request comment can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Apply,
    Plan,
    Help,
}

impl CommandName {
    /// Returns the lowercase token used in comments and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Plan => "plan",
            Self::Help => "help",
        }
    }

    /// Returns the capitalised form used in status descriptions.
    pub fn title(self) -> &'static str {
        match self {
            Self::Apply => "Apply",
            Self::Plan => "Plan",
            Self::Help => "Help",
        }
    }

    /// Parses a comment token into a command name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "apply" => Some(Self::Apply),
            "plan" => Some(Self::Plan),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed pull-request command. Immutable once produced by the comment parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: CommandName,
    pub environment: String,
    pub verbose: bool,
}

impl Command {
    pub fn new(name: CommandName, environment: impl Into<String>, verbose: bool) -> Self {
        Self {
            name,
            environment: environment.into(),
            verbose,
        }
    }
}
