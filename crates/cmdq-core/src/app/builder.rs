//! ServiceBuilder - store / executor のワイヤリング
//!
//! # Fail-fast 設計
//! - store と executor は必須。足りなければ build() が BuildError を返す
//! - config は build() 時に validate する
//! - store handle はここで 1 回だけ作り、各コンポーネントは Arc を共有する

use std::sync::Arc;

use crate::app::{Admin, QueueDrainer, SubmissionCoordinator};
use crate::config::CmdqConfig;
use crate::ports::{Clock, Executor, IdGenerator, KvStore, SystemClock, UlidGenerator};
use crate::store::{QueueStore, ResultStore};

/// BuildError はサービス構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing {0} store. Call `results_store`, `queue_store` or `shared_store` before build().")]
    MissingStore(&'static str),

    #[error("missing executor. Call `executor` before build().")]
    MissingExecutor,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// # 使用例
/// ```ignore
/// let service = ServiceBuilder::new()
///     .shared_store(Arc::new(InMemoryKvStore::new("local")))
///     .executor(Arc::new(EchoExecutor))
///     .build()?;
/// service.coordinator.submit(Command::new("echo hi")?).await?;
/// ```
#[derive(Default)]
pub struct ServiceBuilder {
    results: Option<Arc<dyn KvStore>>,
    queue: Option<Arc<dyn KvStore>>,
    executor: Option<Arc<dyn Executor>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: CmdqConfig,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.results = Some(kv);
        self
    }

    pub fn queue_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.queue = Some(kv);
        self
    }

    /// One store for both namespaces.
    pub fn shared_store(self, kv: Arc<dyn KvStore>) -> Self {
        self.results_store(kv.clone()).queue_store(kv)
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to [`UlidGenerator`] over the configured clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: CmdqConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Service, BuildError> {
        self.config
            .validate()
            .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;

        let results_kv = self.results.ok_or(BuildError::MissingStore("results"))?;
        let queue_kv = self.queue.ok_or(BuildError::MissingStore("queue"))?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));

        let results = ResultStore::new(results_kv);
        let queue = QueueStore::new(queue_kv);
        let coordinator = SubmissionCoordinator::new(results.clone(), queue.clone(), clock.clone());
        let drainer = QueueDrainer::new(
            results.clone(),
            queue.clone(),
            executor,
            clock,
            ids,
            self.config.drain.clone(),
        );
        let admin = Admin::new(results, queue, coordinator.clone());

        tracing::debug!(drainer = %drainer.id(), "service built");
        Ok(Service {
            coordinator,
            drainer,
            admin,
            config: self.config,
        })
    }
}

/// Wired components sharing the same store handles.
#[derive(Clone)]
pub struct Service {
    pub coordinator: SubmissionCoordinator,
    pub drainer: QueueDrainer,
    pub admin: Admin,
    pub config: CmdqConfig,
}

impl Service {
    /// Start background drain workers per `config.worker`.
    pub fn spawn_workers(&self) -> crate::app::WorkerGroup {
        crate::app::WorkerGroup::spawn(&self.drainer, &self.config.worker)
    }
}
