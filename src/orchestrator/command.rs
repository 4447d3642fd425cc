//! Free-text command parsing for the chat console.

use crate::error::{INVESTIGATE_USAGE, MiningError};
use crate::types::TractorRef;

const INVESTIGATE_KEYWORDS: [&str; 2] = ["/investigar", "/automatizar"];
const BULK_ARGUMENT: &str = "todos";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/investigar <Marca> <Modelo...>`
    Investigate(TractorRef),
    /// `/investigar todos`
    InvestigateAll,
    /// Free text that does not start with `/`.
    Chat(String),
    /// Blank input or an unknown `/command`.
    Unrecognized(String),
}

impl Command {
    /// Parse one chat message.
    ///
    /// Returns `InvalidCommand` only for a malformed investigate command.
    /// Parsing has no side effects.
    pub fn parse(input: &str) -> Result<Self, MiningError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(Command::Unrecognized(String::new()));
        }

        if !text.starts_with('/') {
            return Ok(Command::Chat(text.to_string()));
        }

        let mut parts = text.split_whitespace();
        let keyword = parts.next().unwrap_or_default().to_lowercase();

        if !INVESTIGATE_KEYWORDS.contains(&keyword.as_str()) {
            return Ok(Command::Unrecognized(keyword));
        }

        let args: Vec<&str> = parts.collect();
        match args.as_slice() {
            [single] if single.eq_ignore_ascii_case(BULK_ARGUMENT) => Ok(Command::InvestigateAll),
            [company, model @ ..] if !model.is_empty() => {
                Ok(Command::Investigate(TractorRef::new(*company, model.join(" "))?))
            }
            _ => Err(MiningError::InvalidCommand(INVESTIGATE_USAGE.to_string())),
        }
    }

    /// Whether the command drives the extraction backend.
    pub fn is_mining(&self) -> bool {
        matches!(self, Command::Investigate(_) | Command::InvestigateAll)
    }
}
