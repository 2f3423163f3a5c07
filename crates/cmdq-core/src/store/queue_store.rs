//! QueueStore - 未処理コマンドの typed facade
//!
//! key: `queue:<fingerprint>`、value: QueueEntry（JSON）。
//!
//! # 設計原則
//! - 挿入は set_if_absent（同じ fingerprint は 1 件だけ）
//! - 状態遷移は「読んだ raw 値」を expected にした CAS
//! - raw 値には version と claim token が含まれるので、
//!   lease 切れで再 claim された entry を古い owner が上書きすることはない

use std::sync::Arc;

use crate::domain::{CmdqError, FINGERPRINT_TAG, Fingerprint, QueueEntry};
use crate::ports::KvStore;

pub const QUEUE_PREFIX: &str = "queue:";

/// A queue entry together with the exact serialized value it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub fingerprint: Fingerprint,
    pub entry: QueueEntry,
    raw: String,
}

#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KvStore>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn key(fingerprint: &Fingerprint) -> String {
        format!("{QUEUE_PREFIX}{fingerprint}")
    }

    fn encode(key: &str, entry: &QueueEntry) -> Result<String, CmdqError> {
        serde_json::to_string(entry).map_err(|e| CmdqError::CorruptEntry {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<StoredEntry>, CmdqError> {
        let key = Self::key(fingerprint);
        let Some(raw) = self
            .kv
            .get(&key)
            .await
            .map_err(|e| CmdqError::store("queue.get", &key, e))?
        else {
            return Ok(None);
        };

        let entry = serde_json::from_str(&raw).map_err(|e| CmdqError::CorruptEntry {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(StoredEntry {
            fingerprint: fingerprint.clone(),
            entry,
            raw,
        }))
    }

    /// Insert unless an entry already exists. Returns whether this call inserted it.
    pub async fn insert_if_absent(
        &self,
        fingerprint: &Fingerprint,
        entry: &QueueEntry,
    ) -> Result<bool, CmdqError> {
        let key = Self::key(fingerprint);
        let value = Self::encode(&key, entry)?;
        self.kv
            .set_if_absent(&key, value)
            .await
            .map_err(|e| CmdqError::store("queue.insert", &key, e))
    }

    /// Fingerprints of every queue entry, lexicographically ordered.
    pub async fn fingerprints(&self) -> Result<Vec<Fingerprint>, CmdqError> {
        let prefix = format!("{QUEUE_PREFIX}{FINGERPRINT_TAG}");
        let keys = self
            .kv
            .scan_prefix(&prefix)
            .await
            .map_err(|e| CmdqError::store("queue.scan", &prefix, e))?;

        Ok(keys
            .iter()
            .filter_map(|key| {
                let raw = key.strip_prefix(QUEUE_PREFIX)?;
                match Fingerprint::parse(raw) {
                    Ok(fp) => Some(fp),
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "skipping malformed queue key");
                        None
                    }
                }
            })
            .collect())
    }

    /// Scan and load every entry. Entries deleted between scan and read, or
    /// holding an unreadable value, are skipped.
    pub async fn entries(&self) -> Result<Vec<StoredEntry>, CmdqError> {
        let mut out = Vec::new();
        for fp in self.fingerprints().await? {
            match self.get(&fp).await {
                Ok(Some(stored)) => out.push(stored),
                Ok(None) => {}
                Err(err @ CmdqError::CorruptEntry { .. }) => {
                    tracing::warn!(fingerprint = %fp, error = %err, "skipping unreadable queue entry");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// Compare-and-swap `current` to `next`.
    ///
    /// Returns the new stored entry, or `None` if someone changed it first.
    pub async fn transition(
        &self,
        current: &StoredEntry,
        next: QueueEntry,
    ) -> Result<Option<StoredEntry>, CmdqError> {
        let key = Self::key(&current.fingerprint);
        let raw = Self::encode(&key, &next)?;
        let swapped = self
            .kv
            .compare_and_swap(&key, &current.raw, raw.clone())
            .await
            .map_err(|e| CmdqError::store("queue.transition", &key, e))?;

        Ok(swapped.then(|| StoredEntry {
            fingerprint: current.fingerprint.clone(),
            entry: next,
            raw,
        }))
    }

    /// Delete the entry only if it is still exactly `current`.
    pub async fn remove_if_unchanged(&self, current: &StoredEntry) -> Result<bool, CmdqError> {
        let key = Self::key(&current.fingerprint);
        self.kv
            .compare_and_delete(&key, &current.raw)
            .await
            .map_err(|e| CmdqError::store("queue.remove", &key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimToken, Command, DrainerId, EntryState, fingerprint};
    use crate::impls::InMemoryKvStore;
    use crate::ports::KvStore;
    use chrono::{Duration, Utc};
    use ulid::Ulid;

    fn setup() -> (Arc<InMemoryKvStore>, QueueStore) {
        let kv = Arc::new(InMemoryKvStore::new("queue"));
        (kv.clone(), QueueStore::new(kv))
    }

    fn pending(text: &str) -> (Fingerprint, QueueEntry) {
        let cmd = Command::new(text).unwrap();
        (fingerprint(&cmd), QueueEntry::pending(cmd, Utc::now()))
    }

    fn claim_of(entry: &QueueEntry) -> QueueEntry {
        entry.claimed(
            ClaimToken::from_ulid(Ulid::new()),
            DrainerId::from_ulid(Ulid::new()),
            Utc::now(),
            Duration::seconds(30),
        )
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_one_entry() {
        let (kv, store) = setup();
        let (fp, entry) = pending("echo hi");

        assert!(store.insert_if_absent(&fp, &entry).await.unwrap());
        assert!(!store.insert_if_absent(&fp, &entry).await.unwrap());
        assert_eq!(kv.len().await, 1);
    }

    #[tokio::test]
    async fn transition_fails_on_stale_read() {
        let (_, store) = setup();
        let (fp, entry) = pending("echo hi");
        store.insert_if_absent(&fp, &entry).await.unwrap();

        let first_read = store.get(&fp).await.unwrap().unwrap();
        let second_read = first_read.clone();

        let claimed = store
            .transition(&first_read, claim_of(&first_read.entry))
            .await
            .unwrap();
        assert!(claimed.is_some());

        let lost = store
            .transition(&second_read, claim_of(&second_read.entry))
            .await
            .unwrap();
        assert!(lost.is_none());

        let now = store.get(&fp).await.unwrap().unwrap();
        assert_eq!(now.entry.state, EntryState::Claimed);
        assert_eq!(Some(now), claimed);
    }

    #[tokio::test]
    async fn remove_if_unchanged_respects_new_generation() {
        let (_, store) = setup();
        let (fp, entry) = pending("echo hi");
        store.insert_if_absent(&fp, &entry).await.unwrap();

        let read = store.get(&fp).await.unwrap().unwrap();
        let first = store
            .transition(&read, claim_of(&read.entry))
            .await
            .unwrap()
            .unwrap();
        // someone reclaims after lease expiry
        let second = store
            .transition(&first, claim_of(&first.entry))
            .await
            .unwrap()
            .unwrap();

        assert!(!store.remove_if_unchanged(&first).await.unwrap());
        assert!(store.remove_if_unchanged(&second).await.unwrap());
        assert!(store.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_are_listed_in_key_order() {
        let (_, store) = setup();
        let mut fps = Vec::new();
        for text in ["one", "two", "three"] {
            let (fp, entry) = pending(text);
            store.insert_if_absent(&fp, &entry).await.unwrap();
            fps.push(fp);
        }
        fps.sort();

        let listed: Vec<_> = store
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.fingerprint)
            .collect();
        assert_eq!(listed, fps);
    }

    #[tokio::test]
    async fn entries_skip_unreadable_values() {
        let (kv, store) = setup();
        let (fp, entry) = pending("echo hi");
        store.insert_if_absent(&fp, &entry).await.unwrap();
        kv.set(&format!("queue:cmd_{}", "0".repeat(64)), "garbage".into())
            .await
            .unwrap();

        let listed = store.entries().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fingerprint, fp);
    }

    #[tokio::test]
    async fn offline_store_surfaces_store_unavailable() {
        let (kv, store) = setup();
        let (fp, entry) = pending("echo hi");
        kv.set_available(false);

        let err = store.insert_if_absent(&fp, &entry).await.unwrap_err();
        assert!(err.is_transient());
    }
}
