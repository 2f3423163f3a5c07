//! Errors - エラー型と分類
//!
//! 「正常な結果」と「エラー」を区別します。
//! - AlreadyQueued / Cached / Empty / ClaimConflict は outcome（エラーではない）
//! - store の失敗は必ず呼び出し元に返す（握りつぶさない）

use thiserror::Error;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ対象）
/// - Permanent: 恒久的なエラー（エラー結果として確定させる）
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Errors raised by a key-value store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt value at key={key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Failure reported by an executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?} execution failure: {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// CmdqError はコア層のエラー
#[derive(Debug, Error)]
pub enum CmdqError {
    /// Transient: the caller may retry.
    #[error("store unavailable during {operation} (key={key}): {source}")]
    StoreUnavailable {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("corrupt entry at key={key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("build error: {0}")]
    Build(String),
}

impl CmdqError {
    /// Wrap a store failure with the operation and key it happened on.
    pub fn store(operation: &'static str, key: impl Into<String>, source: StoreError) -> Self {
        let key = key.into();
        match source {
            StoreError::Corrupt { key, reason } => CmdqError::CorruptEntry { key, reason },
            source => CmdqError::StoreUnavailable {
                operation,
                key,
                source,
            },
        }
    }

    /// Is this error worth retrying from the caller's side?
    pub fn is_transient(&self) -> bool {
        matches!(self, CmdqError::StoreUnavailable { .. })
    }
}
