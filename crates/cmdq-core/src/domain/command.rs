use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::CmdqError;

/// 呼び出し元から渡されるコマンド文字列（不透明な blob として扱う）。
///
/// Invariant: never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Command(String);

impl Command {
    pub fn new(text: impl Into<String>) -> Result<Self, CmdqError> {
        let text = text.into();
        if text.is_empty() {
            return Err(CmdqError::InvalidCommand("command must not be empty".into()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for Command {
    type Error = CmdqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
