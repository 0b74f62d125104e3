//! QueueProcessor - ワーカープール
//!
//! - `number_of_threads` 個の対称なワーカーが 1 つのキューを drain する
//! - ワーカー間の協調は store の atomic な `lease` だけ
//! - 停止は watch チャネルで伝え、実行中の item は release まで終わらせる

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::handler::MessageHandler;
use super::settings::{QueueProcessorSettings, SettingsError};
use super::stats::{ProcessorStats, ProcessorStatsSnapshot};
use super::worker_loop::Worker;
use crate::domain::QueueName;
use crate::ports::QueueStore;

/// 1 つのキューを N 個のワーカーで処理する
///
/// ワーカーが共有するのは store とカウンタのみ
pub struct QueueProcessor {
    store: Arc<dyn QueueStore>,
    queue: QueueName,
    settings: QueueProcessorSettings,
    handler: Arc<dyn MessageHandler>,
    stats: Arc<ProcessorStats>,
}

impl QueueProcessor {
    /// 設定はここで全部検証する（構築できたら必ず起動できる）
    pub fn new<H: MessageHandler>(
        store: Arc<dyn QueueStore>,
        queue: impl Into<String>,
        settings: QueueProcessorSettings,
        handler: H,
    ) -> Result<Self, SettingsError> {
        let raw = queue.into();
        let queue = QueueName::new(raw.clone()).map_err(|_| SettingsError::MissingQueueName(raw))?;
        settings.validate()?;
        Ok(Self {
            store,
            queue,
            settings,
            handler: Arc::new(handler),
            stats: Arc::new(ProcessorStats::default()),
        })
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn settings(&self) -> &QueueProcessorSettings {
        &self.settings
    }

    pub fn stats(&self) -> ProcessorStatsSnapshot {
        self.stats.snapshot()
    }

    /// 現在の tokio runtime 上にワーカーを spawn する
    pub fn start(self) -> ProcessorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let n = self.settings.number_of_threads;

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let worker = Worker {
                id: worker_id,
                queue: self.queue.clone(),
                store: Arc::clone(&self.store),
                handler: Arc::clone(&self.handler),
                settings: self.settings.clone(),
                stats: Arc::clone(&self.stats),
            };
            joins.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        }
        tracing::info!(queue = %self.queue, workers = n, "queue processor started");

        ProcessorHandle {
            queue: self.queue,
            shutdown_tx,
            joins,
            stats: self.stats,
        }
    }
}

/// 起動中のプロセッサ
/// - `request_shutdown()` で新しい lease を取らなくなる（実行中の handler は止めない）
/// - handle を drop しても同じく全ワーカーが止まる
pub struct ProcessorHandle {
    queue: QueueName,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    stats: Arc<ProcessorStats>,
}

impl ProcessorHandle {
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn stats(&self) -> ProcessorStatsSnapshot {
        self.stats.snapshot()
    }

    /// 各ワーカーに現在のイテレーション後の停止を依頼する
    pub fn request_shutdown(&self) {
        // receiver が全部終わっていても構わない
        let _ = self.shutdown_tx.send(true);
    }

    /// 停止して全ワーカーを待つ。実行中の item は先に release される
    pub async fn shutdown_and_join(self) -> ProcessorStatsSnapshot {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(queue = %self.queue, error = %e, "worker task ended abnormally");
            }
        }
        let snapshot = self.stats.snapshot();
        tracing::info!(queue = %self.queue, ?snapshot, "queue processor stopped");
        snapshot
    }
}
