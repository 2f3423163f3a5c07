//! Outcomes of the core operations.
//!
//! 正常系の分岐（キャッシュ済み、キュー済み、空、競合）はすべてここで表現し、
//! `CmdqError` には入れません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntryState;
use super::fingerprint::Fingerprint;
use super::record::ResultRecord;

/// Result of `SubmissionCoordinator::submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A result already exists; nothing was queued.
    Cached {
        fingerprint: Fingerprint,
        record: ResultRecord,
    },

    /// This call created the queue entry.
    Enqueued { fingerprint: Fingerprint },

    /// Someone else already queued the same command.
    AlreadyQueued {
        fingerprint: Fingerprint,
        state: EntryState,
    },
}

impl SubmitOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            SubmitOutcome::Cached { fingerprint, .. }
            | SubmitOutcome::Enqueued { fingerprint }
            | SubmitOutcome::AlreadyQueued { fingerprint, .. } => fingerprint,
        }
    }

    /// The caller's intent ("make sure this runs") is satisfied without a new entry.
    pub fn is_enqueued(&self) -> bool {
        matches!(
            self,
            SubmitOutcome::Enqueued { .. } | SubmitOutcome::AlreadyQueued { .. }
        )
    }
}

/// How a processed entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Succeeded,

    /// Permanent executor error, stored as an error marker.
    Errored,

    /// A result was already present; the stale queue entry was removed.
    Reconciled,
}

/// Result of `QueueDrainer::drain_one`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    Processed {
        fingerprint: Fingerprint,
        completion: Completion,
    },

    /// Transient failure; the entry is Pending again after backoff.
    Retrying {
        fingerprint: Fingerprint,
        attempts: u32,
        not_before: DateTime<Utc>,
    },

    /// Retry budget exhausted; the entry is now Failed.
    DeadLettered {
        fingerprint: Fingerprint,
        attempts: u32,
    },

    /// Nothing claimable.
    Empty,

    /// Every candidate was claimed by another drainer first.
    ClaimConflict,
}

impl DrainOutcome {
    /// Did this call do any work (so the caller should poll again right away)?
    pub fn made_progress(&self) -> bool {
        !matches!(self, DrainOutcome::Empty | DrainOutcome::ClaimConflict)
    }
}
