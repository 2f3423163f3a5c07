//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryKvStore**: 開発・テスト用の key-value store
//! - **EchoExecutor / ShellExecutor**: Executor
//!
//! 本番用の store 実装（Redis など）は別クレートで KvStore を実装する想定。

pub mod executors;
pub mod inmem_kv;

pub use self::executors::{EchoExecutor, ShellExecutor};
pub use self::inmem_kv::InMemoryKvStore;
