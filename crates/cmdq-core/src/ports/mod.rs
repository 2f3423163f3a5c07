//! Ports - 抽象化レイヤー
//!
//! 外部システム（key-value store、コマンド実行環境、時刻）への
//! インターフェースを定義し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 正しさは store の atomic primitive に委ねる（プロセス内ロックなし）
//! - 実行内容（Executor）はコアにとって不透明

pub mod clock;
pub mod executor;
pub mod id_generator;
pub mod kv_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::Executor;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::kv_store::KvStore;
