//! Executor implementations.
//!
//! - **EchoExecutor**: コマンド文字列をそのまま返す（デモ・テスト用）
//! - **ShellExecutor**: `sh -c` で実行し stdout を返す

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command as ProcessCommand;

use crate::domain::{Command, ExecutionError};
use crate::ports::Executor;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError> {
        Ok(command.as_str().to_string())
    }
}

/// Runs commands through a shell.
///
/// - non-zero exit: permanent（同じ入力なら同じ結果になる前提）
/// - spawn failure / timeout: transient
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shell: "sh".to_string(),
            timeout,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError> {
        let child = ProcessCommand::new(&self.shell)
            .arg("-c")
            .arg(command.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::transient(format!("spawn {}: {e}", self.shell)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ExecutionError::transient(format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| ExecutionError::transient(format!("wait: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::permanent(format!(
                "{}: {}",
                output.status,
                stderr.trim_end()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
