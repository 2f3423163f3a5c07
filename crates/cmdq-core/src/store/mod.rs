//! Typed facades over the key-value store.
//!
//! ResultStore と QueueStore は同じ KvStore を共有しても、別々の store を
//! 使ってもよい（key の prefix で名前空間を分けている）。

mod queue_store;
mod result_store;

pub use queue_store::{QUEUE_PREFIX, QueueStore, StoredEntry};
pub use result_store::{RESULT_PREFIX, ResultStore};
