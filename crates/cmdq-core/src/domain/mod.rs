//! Domain model (command, fingerprint, queue entry, result record, outcomes).

pub mod command;
pub mod entry;
pub mod errors;
pub mod fingerprint;
pub mod ids;
pub mod outcome;
pub mod record;

pub use self::command::Command;
pub use self::entry::{ClaimInfo, EntryState, QueueEntry};
pub use self::errors::{CmdqError, ErrorKind, ExecutionError, StoreError};
pub use self::fingerprint::{FINGERPRINT_TAG, Fingerprint, fingerprint};
pub use self::ids::{ClaimToken, DrainerId};
pub use self::outcome::{Completion, DrainOutcome, SubmitOutcome};
pub use self::record::{ResultOutcome, ResultRecord};
