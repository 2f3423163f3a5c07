//! SubmissionCoordinator - submit-or-reuse
//!
//! # フロー
//! 1. fingerprint を計算
//! 2. ResultStore を先に読む（ResultStore が正本）→ あれば Cached
//! 3. なければ QueueStore に set_if_absent → 入れたら Enqueued
//! 4. 既にあれば AlreadyQueued（エラーではない）
//!    ただし、その間に他の誰かが完了させていれば Cached を返す

use std::sync::Arc;

use crate::domain::{
    CmdqError, Command, EntryState, Fingerprint, QueueEntry, ResultRecord, SubmitOutcome,
};
use crate::ports::Clock;
use crate::store::{QueueStore, ResultStore};

#[derive(Clone)]
pub struct SubmissionCoordinator {
    results: ResultStore,
    queue: QueueStore,
    clock: Arc<dyn Clock>,
}

impl SubmissionCoordinator {
    pub fn new(results: ResultStore, queue: QueueStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            results,
            queue,
            clock,
        }
    }

    pub async fn submit(&self, command: Command) -> Result<SubmitOutcome, CmdqError> {
        let fp = Fingerprint::of(&command);

        if let Some(record) = self.results.get(&fp).await? {
            tracing::debug!(fingerprint = %fp, "result cache hit");
            return Ok(SubmitOutcome::Cached {
                fingerprint: fp,
                record,
            });
        }

        let entry = QueueEntry::pending(command, self.clock.now());
        let inserted = self.queue.insert_if_absent(&fp, &entry).await.inspect_err(|e| {
            tracing::error!(fingerprint = %fp, operation = "enqueue", error = %e, "enqueue failed");
        })?;

        if inserted {
            tracing::info!(fingerprint = %fp, "command enqueued");
            return Ok(SubmitOutcome::Enqueued { fingerprint: fp });
        }

        // Lost the insert: either it was queued earlier, or a drainer finished
        // it between our two reads.
        if let Some(record) = self.results.get(&fp).await? {
            tracing::debug!(fingerprint = %fp, "result appeared during submit");
            return Ok(SubmitOutcome::Cached {
                fingerprint: fp,
                record,
            });
        }

        match self.queue.get(&fp).await? {
            Some(stored) => {
                tracing::info!(fingerprint = %fp, state = ?stored.entry.state, "command already queued");
                Ok(SubmitOutcome::AlreadyQueued {
                    fingerprint: fp,
                    state: stored.entry.state,
                })
            }
            // The entry was completed or removed after our insert attempt and
            // no result is visible (admin delete). Try once more.
            None => {
                let inserted = self.queue.insert_if_absent(&fp, &entry).await?;
                if inserted {
                    tracing::info!(fingerprint = %fp, "command enqueued on retry");
                    Ok(SubmitOutcome::Enqueued { fingerprint: fp })
                } else {
                    Ok(SubmitOutcome::AlreadyQueued {
                        fingerprint: fp,
                        state: EntryState::Pending,
                    })
                }
            }
        }
    }

    /// Read-only view of a command: cached result, queue state, or unknown.
    pub async fn lookup(&self, command: &Command) -> Result<Lookup, CmdqError> {
        let fp = Fingerprint::of(command);
        if let Some(record) = self.results.get(&fp).await? {
            return Ok(Lookup::Cached(record));
        }
        match self.queue.get(&fp).await? {
            Some(stored) => Ok(Lookup::Queued(stored.entry)),
            None => Ok(Lookup::Unknown),
        }
    }
}

/// Result of [`SubmissionCoordinator::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Cached(ResultRecord),
    Queued(QueueEntry),
    Unknown,
}
