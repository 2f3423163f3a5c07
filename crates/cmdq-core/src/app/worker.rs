//! WorkerGroup - drain_one を回し続けるバックグラウンドループ
//!
//! - 各 worker は独立した tokio task（drainer は fork して別 identity）
//! - 何も claim できなかったら idle_poll だけ待つ
//! - shutdown は新しい claim を止めるだけで、実行中のコマンドは最後まで走らせる

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::QueueDrainer;
use crate::config::WorkerConfig;

/// Worker group handle.
/// - `request_shutdown()` で全 worker に停止を通知（handle を drop しても止まる）
/// - `shutdown_and_join()` で全 worker の終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `config.workers` workers, each with its own drainer identity.
    pub fn spawn(drainer: &QueueDrainer, config: &WorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let drainer = drainer.fork();
            let idle_poll = config.idle_poll;
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, drainer, idle_poll, &mut rx).await;
            }));
        }

        tracing::info!(workers = config.workers, "worker group started");
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new claims. In-flight executions run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
        tracing::info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    drainer: QueueDrainer,
    idle_poll: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, drainer = %drainer.id(), "worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let made_progress = match drainer.drain_one().await {
            Ok(outcome) => {
                tracing::debug!(worker_id, ?outcome, "drain finished");
                outcome.made_progress()
            }
            Err(err) => {
                // store outage etc.; back off like an idle poll and try again
                tracing::error!(worker_id, error = %err, transient = err.is_transient(), "drain failed");
                false
            }
        };

        if made_progress {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped: the group handle is gone
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(idle_poll) => {}
        }
    }

    tracing::debug!(worker_id, "worker stopped");
}
