//! cmdq-core
//!
//! Content-addressed command deduplication and queueing.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（command, fingerprint, queue entry, result record, outcome, errors）
//! - **ports**: 抽象化レイヤー（KvStore, Executor, Clock, IdGenerator）
//! - **store**: KvStore 上の typed facade（ResultStore, QueueStore）
//! - **app**: アプリケーションロジック（builder, coordinator, drainer, worker, admin）
//! - **impls**: 実装（InMemoryKvStore, EchoExecutor, ShellExecutor）
//! - **config**: drain / worker の設定
//! - **observability**: 運用向けのビュー（QueueCounts, DeadLetter）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod store;
