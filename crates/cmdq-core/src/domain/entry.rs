//! Queue entry: state machine + claim metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::command::Command;
use super::ids::{ClaimToken, DrainerId};

/// Queue entry state.
///
/// State transitions:
/// - Pending -> Claimed -> (deleted, result written)
/// - Pending -> Claimed -> Pending (transient failure, attempts < max_attempts)
/// - Pending -> Claimed -> Failed (attempts exhausted; dead-letter)
/// - Claimed (lease expired) -> Claimed by another drainer
/// - Failed -> Pending (admin requeue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Claimed,
    Failed,
}

/// Who holds the entry and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub token: ClaimToken,
    pub owner: DrainerId,
    pub claimed_at: DateTime<Utc>,
    pub lease_expires_at: DateTime<Utc>,
}

/// Stored under `queue:<fingerprint>`.
///
/// Every transition bumps `version`, so the serialized form of two different
/// generations of the same entry never compares equal. Compare-and-swap in the
/// store relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub command: Command,
    pub state: EntryState,

    /// Number of claims taken so far (including the current one if Claimed).
    pub attempts: u32,

    pub version: u64,
    pub enqueued_at: DateTime<Utc>,

    /// Earliest time a Pending entry may be claimed (retry backoff).
    pub not_before: Option<DateTime<Utc>>,

    pub claim: Option<ClaimInfo>,
    pub last_error: Option<String>,
}

impl QueueEntry {
    pub fn pending(command: Command, now: DateTime<Utc>) -> Self {
        Self {
            command,
            state: EntryState::Pending,
            attempts: 0,
            version: 0,
            enqueued_at: now,
            not_before: None,
            claim: None,
            last_error: None,
        }
    }

    /// Can a drainer take this entry at `now`?
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            EntryState::Pending => self.not_before.is_none_or(|t| t <= now),
            EntryState::Claimed => self.is_lease_expired(now),
            EntryState::Failed => false,
        }
    }

    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == EntryState::Claimed
            && self
                .claim
                .as_ref()
                .is_none_or(|claim| claim.lease_expires_at <= now)
    }

    /// Next generation: Claimed by `owner` under `token`.
    pub fn claimed(
        &self,
        token: ClaimToken,
        owner: DrainerId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Self {
        Self {
            state: EntryState::Claimed,
            attempts: self.attempts + 1,
            version: self.version + 1,
            not_before: None,
            claim: Some(ClaimInfo {
                token,
                owner,
                claimed_at: now,
                lease_expires_at: now
                    .checked_add_signed(lease)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            }),
            ..self.clone()
        }
    }

    /// Next generation: back to Pending after a failed attempt.
    pub fn released(&self, not_before: DateTime<Utc>, error: String) -> Self {
        Self {
            state: EntryState::Pending,
            version: self.version + 1,
            not_before: Some(not_before),
            claim: None,
            last_error: Some(error),
            ..self.clone()
        }
    }

    /// Next generation: dead-letter.
    pub fn failed(&self, error: String) -> Self {
        Self {
            state: EntryState::Failed,
            version: self.version + 1,
            not_before: None,
            claim: None,
            last_error: Some(error),
            ..self.clone()
        }
    }

    /// Next generation: Failed -> Pending with a fresh retry budget.
    pub fn requeued(&self) -> Self {
        Self {
            state: EntryState::Pending,
            attempts: 0,
            version: self.version + 1,
            not_before: None,
            claim: None,
            ..self.clone()
        }
    }
}
