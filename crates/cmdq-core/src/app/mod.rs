//! App - アプリケーション層
//!
//! ports と store を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ServiceBuilder**: store / executor のワイヤリング
//! - **SubmissionCoordinator**: submit-or-reuse
//! - **QueueDrainer**: single-claim dequeue と実行
//! - **WorkerGroup**: drain_one を回すバックグラウンドループ
//! - **Admin**: 結果の一覧・削除・全消去、dead-letter の再投入

pub mod admin;
pub mod builder;
pub mod coordinator;
pub mod drainer;
pub mod retry;
pub mod worker;

pub use self::admin::Admin;
pub use self::builder::{BuildError, Service, ServiceBuilder};
pub use self::coordinator::{Lookup, SubmissionCoordinator};
pub use self::drainer::QueueDrainer;
pub use self::retry::RetryPolicy;
pub use self::worker::WorkerGroup;
