//! Runtime configuration.
//!
//! 全フィールドに default があるので、JSON では上書きしたい項目だけ書けばよい。
//! store の接続先や認証情報はここには含めない（KvStore 実装側の責務）。

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::RetryPolicy;
use crate::app::retry::millis;
use crate::domain::CmdqError;

/// Claim / retry behaviour of the drainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// How long a claim stays valid before another drainer may take it over.
    #[serde(with = "millis")]
    pub lease: Duration,

    /// Claims allowed per entry before it is dead-lettered.
    pub max_attempts: u32,

    pub retry: RetryPolicy,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            max_attempts: 5,
            retry: RetryPolicy::default_v1(),
        }
    }
}

/// Background worker group settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub workers: usize,

    /// Sleep between polls when the queue has nothing claimable.
    #[serde(with = "millis")]
    pub idle_poll: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            idle_poll: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmdqConfig {
    pub drain: DrainConfig,
    pub worker: WorkerConfig,
}

impl CmdqConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, CmdqError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CmdqError::Build(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CmdqError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CmdqError::Build(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CmdqError> {
        if self.drain.max_attempts == 0 {
            return Err(CmdqError::Build("drain.max_attempts must be at least 1".into()));
        }
        if self.drain.lease.is_zero() {
            return Err(CmdqError::Build("drain.lease must be positive".into()));
        }
        let representable = chrono::Duration::from_std(self.drain.lease)
            .ok()
            .and_then(|lease| Utc::now().checked_add_signed(lease))
            .is_some();
        if !representable {
            return Err(CmdqError::Build(format!(
                "drain.lease is out of range: {:?}",
                self.drain.lease
            )));
        }
        if self.worker.workers == 0 {
            return Err(CmdqError::Build("worker.workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = CmdqConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CmdqConfig::default());
        assert_eq!(config.drain.lease, Duration::from_secs(30));
        assert_eq!(config.drain.max_attempts, 5);
        assert_eq!(config.worker.workers, 2);
    }

    #[test]
    fn partial_override() {
        let config = CmdqConfig::from_json_str(
            r#"{"drain": {"lease": 1000, "retry": {"base_delay": 10}}, "worker": {"workers": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.drain.lease, Duration::from_secs(1));
        assert_eq!(config.drain.max_attempts, 5);
        assert_eq!(config.drain.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.worker.workers, 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(CmdqConfig::from_json_str(r#"{"drain": {"max_attempts": 0}}"#).is_err());
        assert!(CmdqConfig::from_json_str(r#"{"drain": {"lease": 0}}"#).is_err());
        assert!(CmdqConfig::from_json_str(r#"{"worker": {"workers": 0}}"#).is_err());
        assert!(CmdqConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn oversized_lease_is_rejected() {
        let mut config = CmdqConfig::default();
        config.drain.lease = Duration::from_secs(10_000_000_000_000);
        assert!(matches!(config.validate(), Err(CmdqError::Build(_))));

        config.drain.lease = Duration::from_secs(365 * 24 * 3600);
        assert!(config.validate().is_ok());
    }
}
