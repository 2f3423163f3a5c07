//! QueueDrainer - single-claim dequeue
//!
//! # フロー
//! 1. `queue:cmd_` を辞書順に scan（FIFO は保証しない）
//! 2. claim 可能な entry（Pending かつ backoff 済み / lease 切れの Claimed）を探す
//! 3. 読んだ raw 値を expected にして CAS で Claimed へ（負けたら次の候補へ）
//! 4. ResultStore に既に結果があれば entry を消して終わり（hand-off 途中の crash 回復）
//! 5. Executor 実行
//! 6. 成功 / permanent エラー → ResultStore に write-once → entry を compare-and-delete
//!    transient エラー → Pending に戻す（backoff）か、予算切れなら Failed（dead-letter）
//!
//! 複数の drainer が並行に呼んでも、同じ entry を同時に claim するのは 1 つだけ。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::DrainConfig;
use crate::domain::{
    CmdqError, Completion, DrainOutcome, DrainerId, EntryState, ExecutionError, ResultRecord,
};
use crate::ports::{Clock, Executor, IdGenerator};
use crate::store::{QueueStore, ResultStore, StoredEntry};

/// Result of one claim attempt on one candidate.
enum ClaimAttempt {
    Claimed(StoredEntry),
    DeadLettered(DrainOutcome),
    Lost,
}

#[derive(Clone)]
pub struct QueueDrainer {
    id: DrainerId,
    results: ResultStore,
    queue: QueueStore,
    executor: Arc<dyn Executor>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: DrainConfig,
}

impl QueueDrainer {
    pub fn new(
        results: ResultStore,
        queue: QueueStore,
        executor: Arc<dyn Executor>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: DrainConfig,
    ) -> Self {
        Self {
            id: ids.generate_drainer_id(),
            results,
            queue,
            executor,
            clock,
            ids,
            config,
        }
    }

    pub fn id(&self) -> DrainerId {
        self.id
    }

    /// Same stores and executor, new drainer identity.
    pub fn fork(&self) -> Self {
        Self {
            id: self.ids.generate_drainer_id(),
            ..self.clone()
        }
    }

    /// Claim and process at most one entry.
    pub async fn drain_one(&self) -> Result<DrainOutcome, CmdqError> {
        let now = self.clock.now();
        let mut lost = 0usize;

        for fp in self.queue.fingerprints().await? {
            let stored = match self.queue.get(&fp).await {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(err @ CmdqError::CorruptEntry { .. }) => {
                    tracing::error!(fingerprint = %fp, error = %err, "skipping unreadable queue entry");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if !stored.entry.is_claimable(now) {
                continue;
            }

            match self.try_claim(stored, now).await? {
                ClaimAttempt::Claimed(claimed) => return self.process(claimed).await,
                ClaimAttempt::DeadLettered(outcome) => return Ok(outcome),
                ClaimAttempt::Lost => {
                    tracing::debug!(fingerprint = %fp, drainer = %self.id, "claim lost, trying next entry");
                    lost += 1;
                }
            }
        }

        Ok(if lost > 0 {
            DrainOutcome::ClaimConflict
        } else {
            DrainOutcome::Empty
        })
    }

    async fn try_claim(
        &self,
        stored: StoredEntry,
        now: DateTime<Utc>,
    ) -> Result<ClaimAttempt, CmdqError> {
        let fp = stored.fingerprint.clone();

        // A stale claim whose owner already used the last attempt: do not run it again.
        if stored.entry.state == EntryState::Claimed
            && stored.entry.attempts >= self.config.max_attempts
        {
            let attempts = stored.entry.attempts;
            let reason = format!("lease expired on final attempt ({attempts})");
            return match self.queue.transition(&stored, stored.entry.failed(reason)).await? {
                Some(_) => {
                    tracing::warn!(fingerprint = %fp, attempts, "stale claim dead-lettered");
                    Ok(ClaimAttempt::DeadLettered(DrainOutcome::DeadLettered {
                        fingerprint: fp,
                        attempts,
                    }))
                }
                None => Ok(ClaimAttempt::Lost),
            };
        }

        if stored.entry.state == EntryState::Claimed {
            tracing::warn!(
                fingerprint = %fp,
                previous_owner = ?stored.entry.claim.as_ref().map(|c| c.owner),
                attempts = stored.entry.attempts,
                "reclaiming entry with expired lease"
            );
        }

        let next = stored.entry.claimed(
            self.ids.generate_claim_token(),
            self.id,
            now,
            to_chrono(self.config.lease),
        );
        Ok(match self.queue.transition(&stored, next).await? {
            Some(claimed) => ClaimAttempt::Claimed(claimed),
            None => ClaimAttempt::Lost,
        })
    }

    async fn process(&self, claimed: StoredEntry) -> Result<DrainOutcome, CmdqError> {
        let fp = claimed.fingerprint.clone();

        let existing = match self.results.get(&fp).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::error!(fingerprint = %fp, operation = "result.get", error = %err, "result read failed");
                self.compensate(&claimed, &err).await;
                return Err(err);
            }
        };
        if existing.is_some() {
            tracing::info!(fingerprint = %fp, "result already stored, removing leftover queue entry");
            self.release(&claimed).await?;
            return Ok(DrainOutcome::Processed {
                fingerprint: fp,
                completion: Completion::Reconciled,
            });
        }

        let command = claimed.entry.command.clone();
        let attempts = claimed.entry.attempts;
        tracing::info!(fingerprint = %fp, drainer = %self.id, attempts, "executing command");

        match self.executor.execute(&command).await {
            Ok(output) => {
                let record = ResultRecord::success(command, output, attempts, self.clock.now());
                self.complete(&claimed, record, Completion::Succeeded).await
            }
            Err(err) if !err.is_retryable() => {
                tracing::warn!(fingerprint = %fp, error = %err, "command failed permanently");
                let record = ResultRecord::error(command, err.message, attempts, self.clock.now());
                self.complete(&claimed, record, Completion::Errored).await
            }
            Err(err) => self.fail_attempt(&claimed, err).await,
        }
    }

    /// Write the result (write-once), then drop our queue entry.
    async fn complete(
        &self,
        claimed: &StoredEntry,
        record: ResultRecord,
        completion: Completion,
    ) -> Result<DrainOutcome, CmdqError> {
        let fp = &claimed.fingerprint;

        let written = match self.results.put_once(fp, &record).await {
            Ok(written) => written,
            Err(err) => {
                tracing::error!(fingerprint = %fp, operation = "result.put_once", error = %err, "result write failed");
                self.compensate(claimed, &err).await;
                return Err(err);
            }
        };
        if !written {
            tracing::info!(fingerprint = %fp, "result already present, keeping existing record");
        }

        self.release(claimed).await?;
        tracing::info!(fingerprint = %fp, ?completion, "command processed");
        Ok(DrainOutcome::Processed {
            fingerprint: fp.clone(),
            completion,
        })
    }

    /// Transient failure: back to Pending with backoff, or dead-letter.
    async fn fail_attempt(
        &self,
        claimed: &StoredEntry,
        err: ExecutionError,
    ) -> Result<DrainOutcome, CmdqError> {
        let fp = claimed.fingerprint.clone();
        let attempts = claimed.entry.attempts;

        if attempts >= self.config.max_attempts {
            let next = claimed.entry.failed(err.message.clone());
            return match self.queue.transition(claimed, next).await.inspect_err(|e| {
                tracing::error!(fingerprint = %fp, operation = "dead_letter", error = %e, "queue write failed");
            })? {
                Some(_) => {
                    tracing::warn!(fingerprint = %fp, attempts, error = %err, "retry budget exhausted, entry dead-lettered");
                    Ok(DrainOutcome::DeadLettered {
                        fingerprint: fp,
                        attempts,
                    })
                }
                None => {
                    tracing::warn!(fingerprint = %fp, "claim lost before dead-lettering");
                    Ok(DrainOutcome::ClaimConflict)
                }
            };
        }

        let not_before = after(self.clock.now(), self.config.retry.next_delay(attempts));
        let next = claimed.entry.released(not_before, err.message.clone());
        match self.queue.transition(claimed, next).await.inspect_err(|e| {
            tracing::error!(fingerprint = %fp, operation = "release", error = %e, "queue write failed");
        })? {
            Some(_) => {
                tracing::warn!(fingerprint = %fp, attempts, error = %err, %not_before, "command failed, retry scheduled");
                Ok(DrainOutcome::Retrying {
                    fingerprint: fp,
                    attempts,
                    not_before,
                })
            }
            None => {
                tracing::warn!(fingerprint = %fp, "claim lost before release");
                Ok(DrainOutcome::ClaimConflict)
            }
        }
    }

    /// Delete the claimed entry if we still own it.
    async fn release(&self, claimed: &StoredEntry) -> Result<(), CmdqError> {
        let fp = &claimed.fingerprint;
        let removed = self.queue.remove_if_unchanged(claimed).await.inspect_err(|e| {
            tracing::error!(fingerprint = %fp, operation = "queue.remove", error = %e, "queue delete failed");
        })?;
        if !removed {
            // Lease expired and another drainer took over; the stored result is authoritative.
            tracing::warn!(fingerprint = %fp, drainer = %self.id, "claim lost before queue delete");
        }
        Ok(())
    }

    /// Result store failed mid-claim: hand the entry back so it is retried without waiting for the lease.
    async fn compensate(&self, claimed: &StoredEntry, cause: &CmdqError) {
        let fp = &claimed.fingerprint;
        let next = claimed
            .entry
            .released(self.clock.now(), format!("result store failed: {cause}"));
        match self.queue.transition(claimed, next).await {
            Ok(Some(_)) => tracing::info!(fingerprint = %fp, "claim released after result store failure"),
            Ok(None) => tracing::warn!(fingerprint = %fp, "claim already lost, nothing to release"),
            Err(err) => tracing::error!(
                fingerprint = %fp,
                operation = "queue.release",
                error = %err,
                "could not release claim; it will be retried after lease expiry"
            ),
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn after(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    now.checked_add_signed(to_chrono(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
