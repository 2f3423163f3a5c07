//! ResultStore - 完了済み結果の typed facade
//!
//! key: `result:<fingerprint>`、value: ResultRecord（JSON）。
//! 書き込みは set_if_absent のみ（write-once）。

use std::sync::Arc;

use crate::domain::{CmdqError, FINGERPRINT_TAG, Fingerprint, ResultRecord};
use crate::ports::KvStore;

pub const RESULT_PREFIX: &str = "result:";

#[derive(Clone)]
pub struct ResultStore {
    kv: Arc<dyn KvStore>,
}

impl ResultStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn key(fingerprint: &Fingerprint) -> String {
        format!("{RESULT_PREFIX}{fingerprint}")
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ResultRecord>, CmdqError> {
        let key = Self::key(fingerprint);
        let raw = self
            .kv
            .get(&key)
            .await
            .map_err(|e| CmdqError::store("result.get", &key, e))?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| CmdqError::CorruptEntry {
                key: key.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    /// Store a record unless one already exists. Returns whether this call wrote it.
    pub async fn put_once(
        &self,
        fingerprint: &Fingerprint,
        record: &ResultRecord,
    ) -> Result<bool, CmdqError> {
        let key = Self::key(fingerprint);
        let value = serde_json::to_string(record).map_err(|e| CmdqError::CorruptEntry {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.kv
            .set_if_absent(&key, value)
            .await
            .map_err(|e| CmdqError::store("result.put_once", &key, e))
    }

    /// Fingerprints of every stored result, lexicographically ordered.
    pub async fn list(&self) -> Result<Vec<Fingerprint>, CmdqError> {
        let prefix = format!("{RESULT_PREFIX}{FINGERPRINT_TAG}");
        let keys = self
            .kv
            .scan_prefix(&prefix)
            .await
            .map_err(|e| CmdqError::store("result.scan", &prefix, e))?;

        Ok(keys
            .iter()
            .filter_map(|key| {
                let raw = key.strip_prefix(RESULT_PREFIX)?;
                match Fingerprint::parse(raw) {
                    Ok(fp) => Some(fp),
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "skipping malformed result key");
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn delete(&self, fingerprint: &Fingerprint) -> Result<u64, CmdqError> {
        let key = Self::key(fingerprint);
        self.kv
            .delete(&key)
            .await
            .map_err(|e| CmdqError::store("result.delete", &key, e))
    }

    /// Clear the whole result namespace.
    pub async fn flush(&self) -> Result<u64, CmdqError> {
        self.kv
            .flush_prefix(RESULT_PREFIX)
            .await
            .map_err(|e| CmdqError::store("result.flush", RESULT_PREFIX, e))
    }
}
