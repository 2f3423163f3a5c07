//! InMemoryKvStore - 開発・テスト用の key-value store
//!
//! # 実装詳細
//! - BTreeMap<String, String> を tokio の Mutex で保護（scan が辞書順になる）
//! - 各操作は 1 回のロック内で完結するので set_if_absent / CAS は atomic
//! - `set_available(false)` で障害を再現できる（StoreUnavailable のテスト用）

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::KvStore;

pub struct InMemoryKvStore {
    name: String,
    entries: Mutex<BTreeMap<String, String>>,
    available: AtomicBool,
}

impl InMemoryKvStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "in-memory store `{}` is offline",
                self.name
            )))
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: String,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(current) if current == expected => {
                *current = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|current| current == expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(u64::from(self.entries.lock().await.remove(key).is_some()))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let entries = self.entries.lock().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn flush_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_only_writes_once() {
        let store = InMemoryKvStore::new("t");
        assert!(store.set_if_absent("k", "a".into()).await.unwrap());
        assert!(!store.set_if_absent("k", "b".into()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn compare_and_swap_checks_the_current_value() {
        let store = InMemoryKvStore::new("t");
        store.set("k", "v1".into()).await.unwrap();

        assert!(!store.compare_and_swap("k", "stale", "v2".into()).await.unwrap());
        assert!(store.compare_and_swap("k", "v1", "v2".into()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        // missing key never matches
        assert!(!store.compare_and_swap("missing", "v1", "x".into()).await.unwrap());
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn compare_and_delete_checks_the_current_value() {
        let store = InMemoryKvStore::new("t");
        store.set("k", "v1".into()).await.unwrap();
        assert!(!store.compare_and_delete("k", "v0").await.unwrap());
        assert!(store.compare_and_delete("k", "v1").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let store = InMemoryKvStore::new("t");
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.delete("k").await.unwrap(), 1);
        assert_eq!(store.delete("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scan_and_flush_respect_prefix() {
        let store = InMemoryKvStore::new("t");
        for key in ["queue:b", "queue:a", "result:a", "queuex"] {
            store.set(key, "v".into()).await.unwrap();
        }

        let keys = store.scan_prefix("queue:").await.unwrap();
        assert_eq!(keys, vec!["queue:a".to_string(), "queue:b".to_string()]);

        assert_eq!(store.flush_prefix("queue:").await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.scan_prefix("queue:").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = InMemoryKvStore::new("t");
        store.set_available(false);
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.set_if_absent("k", "v".into()).await.is_err());

        store.set_available(true);
        assert!(store.set_if_absent("k", "v".into()).await.unwrap());
    }
}
