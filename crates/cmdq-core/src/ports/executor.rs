//! Executor port - コマンドの実行を注入する
//!
//! 「実行」の意味はコアにとって不透明です。
//! 長時間かかってもよいが、その場合は lease より短く収めること。

use async_trait::async_trait;

use crate::domain::{Command, ExecutionError};

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the command and return its output.
    ///
    /// Transient errors are retried by the drainer; permanent errors become
    /// the cached result.
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError>;
}
