use serde::{Deserialize, Serialize};

use crate::domain::{EntryState, Fingerprint, QueueEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub claimed: usize,
    pub failed: usize,
    pub results: usize,
}

impl QueueCounts {
    pub(crate) fn record(&mut self, state: EntryState) {
        match state {
            EntryState::Pending => self.pending += 1,
            EntryState::Claimed => self.claimed += 1,
            EntryState::Failed => self.failed += 1,
        }
    }

    /// Entries still waiting for (or under) execution.
    pub fn in_flight(&self) -> usize {
        self.pending + self.claimed
    }
}

/// A dead-lettered entry as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub fingerprint: Fingerprint,
    pub command: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl DeadLetter {
    pub(crate) fn from_entry(fingerprint: Fingerprint, entry: &QueueEntry) -> Self {
        Self {
            fingerprint,
            command: entry.command.to_string(),
            attempts: entry.attempts,
            last_error: entry.last_error.clone(),
        }
    }
}
