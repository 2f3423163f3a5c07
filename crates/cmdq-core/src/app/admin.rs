//! Admin - 運用向け操作
//!
//! 結果の一覧 / 削除 / 全消去と、dead-letter の確認・再投入。
//! 認可やレート制限は呼び出し側（境界）の責務。

use crate::app::coordinator::{Lookup, SubmissionCoordinator};
use crate::domain::{CmdqError, Command, EntryState, Fingerprint};
use crate::observability::{DeadLetter, QueueCounts};
use crate::store::{QueueStore, ResultStore};

#[derive(Clone)]
pub struct Admin {
    results: ResultStore,
    queue: QueueStore,
    coordinator: SubmissionCoordinator,
}

impl Admin {
    pub fn new(results: ResultStore, queue: QueueStore, coordinator: SubmissionCoordinator) -> Self {
        Self {
            results,
            queue,
            coordinator,
        }
    }

    /// Every stored result fingerprint, sorted.
    pub async fn list_all(&self) -> Result<Vec<Fingerprint>, CmdqError> {
        self.results.list().await
    }

    /// Remove one result. Absent keys give 0.
    pub async fn delete(&self, fingerprint: &Fingerprint) -> Result<u64, CmdqError> {
        let removed = self.results.delete(fingerprint).await?;
        tracing::info!(fingerprint = %fingerprint, removed, "result deleted");
        Ok(removed)
    }

    pub async fn delete_command(&self, command: &Command) -> Result<u64, CmdqError> {
        self.delete(&Fingerprint::of(command)).await
    }

    /// Clear every stored result. Queue entries are left alone.
    pub async fn flush_all(&self) -> Result<(), CmdqError> {
        let removed = self.results.flush().await?;
        tracing::warn!(removed, "result namespace flushed");
        Ok(())
    }

    pub async fn lookup(&self, command: &Command) -> Result<Lookup, CmdqError> {
        self.coordinator.lookup(command).await
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, CmdqError> {
        Ok(self
            .queue
            .entries()
            .await?
            .into_iter()
            .filter(|stored| stored.entry.state == EntryState::Failed)
            .map(|stored| DeadLetter::from_entry(stored.fingerprint.clone(), &stored.entry))
            .collect())
    }

    /// Failed -> Pending with a fresh retry budget.
    ///
    /// `false` if the entry is missing, not Failed, or changed concurrently.
    pub async fn requeue(&self, fingerprint: &Fingerprint) -> Result<bool, CmdqError> {
        let Some(stored) = self.queue.get(fingerprint).await? else {
            return Ok(false);
        };
        if stored.entry.state != EntryState::Failed {
            return Ok(false);
        }

        let requeued = self
            .queue
            .transition(&stored, stored.entry.requeued())
            .await?
            .is_some();
        if requeued {
            tracing::info!(fingerprint = %fingerprint, "dead-lettered entry requeued");
        }
        Ok(requeued)
    }

    pub async fn counts(&self) -> Result<QueueCounts, CmdqError> {
        let mut counts = QueueCounts::default();
        for stored in self.queue.entries().await? {
            counts.record(stored.entry.state);
        }
        counts.results = self.results.list().await?.len();
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{QueueDrainer, RetryPolicy};
    use crate::config::DrainConfig;
    use crate::domain::{DrainOutcome, ExecutionError, ResultRecord, SubmitOutcome};
    use crate::impls::InMemoryKvStore;
    use crate::ports::{Executor, SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    struct AlwaysTransient;

    #[async_trait]
    impl Executor for AlwaysTransient {
        async fn execute(&self, _command: &Command) -> Result<String, ExecutionError> {
            Err(ExecutionError::transient("connection refused"))
        }
    }

    struct Fixture {
        admin: Admin,
        results: ResultStore,
        coordinator: SubmissionCoordinator,
        drainer: QueueDrainer,
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(InMemoryKvStore::new("shared"));
        let results = ResultStore::new(kv.clone());
        let queue = QueueStore::new(kv);
        let clock = Arc::new(SystemClock);
        let coordinator = SubmissionCoordinator::new(results.clone(), queue.clone(), clock.clone());
        let drainer = QueueDrainer::new(
            results.clone(),
            queue.clone(),
            Arc::new(AlwaysTransient),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock)),
            DrainConfig {
                max_attempts: 1,
                retry: RetryPolicy::immediate(),
                ..DrainConfig::default()
            },
        );
        Fixture {
            admin: Admin::new(results.clone(), queue, coordinator.clone()),
            results,
            coordinator,
            drainer,
        }
    }

    async fn store_result(results: &ResultStore, text: &str) -> Fingerprint {
        let command = Command::new(text).unwrap();
        let fp = Fingerprint::of(&command);
        let record = ResultRecord::success(command, text, 1, Utc::now());
        results.put_once(&fp, &record).await.unwrap();
        fp
    }

    #[tokio::test]
    async fn list_all_is_sorted() {
        let f = fixture();
        let mut expected = vec![
            store_result(&f.results, "a").await,
            store_result(&f.results, "b").await,
            store_result(&f.results, "c").await,
        ];
        expected.sort();
        assert_eq!(f.admin.list_all().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let f = fixture();
        store_result(&f.results, "a").await;
        store_result(&f.results, "b").await;
        f.coordinator
            .submit(Command::new("still queued").unwrap())
            .await
            .unwrap();

        f.admin.flush_all().await.unwrap();
        assert!(f.admin.list_all().await.unwrap().is_empty());
        assert_eq!(f.admin.counts().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn delete_counts_removed_keys() {
        let f = fixture();
        let fp = store_result(&f.results, "echo hi").await;

        assert_eq!(f.admin.delete(&fp).await.unwrap(), 1);
        assert_eq!(f.admin.delete(&fp).await.unwrap(), 0);

        let missing = Fingerprint::of(&Command::new("never ran").unwrap());
        assert_eq!(f.admin.delete(&missing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_command_text() {
        let f = fixture();
        store_result(&f.results, "echo hi").await;
        assert_eq!(
            f.admin
                .delete_command(&Command::new("echo hi").unwrap())
                .await
                .unwrap(),
            1
        );
        assert!(f.admin.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dead_letter_can_be_requeued() {
        let f = fixture();
        let command = Command::new("curl http://down").unwrap();
        f.coordinator.submit(command.clone()).await.unwrap();

        let fp = Fingerprint::of(&command);
        assert_eq!(
            f.drainer.drain_one().await.unwrap(),
            DrainOutcome::DeadLettered {
                fingerprint: fp.clone(),
                attempts: 1
            }
        );

        let dead = f.admin.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].fingerprint, fp);
        assert_eq!(dead[0].last_error.as_deref(), Some("connection refused"));

        // resubmitting does not revive a dead-lettered entry
        assert_eq!(
            f.coordinator.submit(command.clone()).await.unwrap(),
            SubmitOutcome::AlreadyQueued {
                fingerprint: fp.clone(),
                state: EntryState::Failed
            }
        );

        assert!(f.admin.requeue(&fp).await.unwrap());
        assert!(!f.admin.requeue(&fp).await.unwrap());
        assert!(f.admin.dead_letters().await.unwrap().is_empty());

        let Lookup::Queued(entry) = f.admin.lookup(&command).await.unwrap() else {
            panic!("entry should still be queued");
        };
        assert_eq!(entry.state, EntryState::Pending);
        assert_eq!(entry.attempts, 0);
    }

    #[tokio::test]
    async fn requeue_of_unknown_entry_is_false() {
        let f = fixture();
        let fp = Fingerprint::of(&Command::new("nothing").unwrap());
        assert!(!f.admin.requeue(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_queue_value_does_not_break_views() {
        use crate::ports::KvStore;

        let kv = Arc::new(InMemoryKvStore::new("shared"));
        let results = ResultStore::new(kv.clone());
        let queue = QueueStore::new(kv.clone());
        let coordinator =
            SubmissionCoordinator::new(results.clone(), queue.clone(), Arc::new(SystemClock));
        let admin = Admin::new(results, queue, coordinator.clone());

        coordinator
            .submit(Command::new("waiting").unwrap())
            .await
            .unwrap();
        kv.set(&format!("queue:cmd_{}", "f".repeat(64)), "{not json".into())
            .await
            .unwrap();

        assert_eq!(admin.counts().await.unwrap().pending, 1);
        assert!(admin.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counts_cover_both_namespaces() {
        let f = fixture();
        store_result(&f.results, "done").await;
        f.coordinator
            .submit(Command::new("waiting").unwrap())
            .await
            .unwrap();

        let counts = f.admin.counts().await.unwrap();
        assert_eq!(
            counts,
            QueueCounts {
                pending: 1,
                claimed: 0,
                failed: 0,
                results: 1
            }
        );
    }
}
