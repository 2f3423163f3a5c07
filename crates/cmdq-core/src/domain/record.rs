//! Result record: the cached outcome of one command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::Command;

/// What the executor produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultOutcome {
    Success { output: String },

    /// Error marker for permanent execution failures.
    Error { message: String },
}

/// Stored under `result:<fingerprint>`. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub command: Command,
    pub outcome: ResultOutcome,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn success(
        command: Command,
        output: impl Into<String>,
        attempts: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            command,
            outcome: ResultOutcome::Success {
                output: output.into(),
            },
            attempts,
            completed_at,
        }
    }

    pub fn error(
        command: Command,
        message: impl Into<String>,
        attempts: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            command,
            outcome: ResultOutcome::Error {
                message: message.into(),
            },
            attempts,
            completed_at,
        }
    }

    /// Executor output, if the command succeeded.
    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            ResultOutcome::Success { output } => Some(output),
            ResultOutcome::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_is_tagged_in_json() {
        let rec = ResultRecord::success(Command::new("echo hi").unwrap(), "hi", 1, Utc::now());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["outcome"]["kind"], "success");
        assert_eq!(json["outcome"]["output"], "hi");
        assert_eq!(json["command"], "echo hi");
    }

    #[test]
    fn error_marker_has_no_output() {
        let rec = ResultRecord::error(Command::new("false").unwrap(), "exit 1", 1, Utc::now());
        assert_eq!(rec.output(), None);
    }
}
