//! Worker loop - 1 ワーカー = 1 タスク
//!
//! # 状態遷移
//! ```text
//! Idle --lease--> Leased --handler--> Resolving --release--> Idle
//!   |                                                          |
//!   +--(empty / store error)--> Backoff --(sleep)--> Idle      |
//!   +--(stop)--> Stopped <-------------------------------------+
//! ```
//!
//! - 停止シグナルはイテレーションの境目でのみ見る（handler 実行中は見ない）
//! - handler は別タスクで実行し、panic も `UnhandledException` に畳み込む
//! - release が stale（conflict / not found）なら結果は黙って捨てる

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::Instrument;

use super::handler::{HandlerError, MessageHandler};
use super::resolver::resolve;
use super::settings::QueueProcessorSettings;
use super::stats::ProcessorStats;
use crate::domain::{
    ErrorKind, ItemId, LeaseId, LeasedItem, MessageProcessingResult, ProcessingResult, QueueError,
    QueueName, ReleaseOutcome,
};
use crate::ports::QueueStore;

/// release の試行回数。使い切ったら lease の期限切れに任せる
const RELEASE_ATTEMPTS: u32 = 3;

/// このワーカーが保持しているつもりの item と、その上で動く handler
struct RunningItem {
    id: ItemId,
    lease_id: LeaseId,
    /// store 側で lease が切れる時刻のローカル推定
    expiration: Instant,
    handle: JoinHandle<Result<MessageProcessingResult, HandlerError>>,
}

impl RunningItem {
    fn start(leased: LeasedItem, lock: Duration, handler: Arc<dyn MessageHandler>) -> Self {
        let LeasedItem { id, data, lease_id } = leased;
        let expiration = Instant::now() + lock;
        let handle = tokio::spawn(async move { handler.handle(data).await });
        Self {
            id,
            lease_id,
            expiration,
            handle,
        }
    }

    /// handler の終了を待ち、結果を分類する
    async fn finish(self) -> (ItemId, LeaseId, Instant, ProcessingResult) {
        let result = match self.handle.await {
            Ok(Ok(result)) => result.into(),
            Ok(Err(e)) => ProcessingResult::UnhandledException(e.to_string()),
            Err(e) => classify_join_error(e),
        };
        (self.id, self.lease_id, self.expiration, result)
    }
}

fn classify_join_error(e: JoinError) -> ProcessingResult {
    if e.is_panic() {
        ProcessingResult::UnhandledException(format!(
            "handler panicked: {}",
            panic_message(e.into_panic())
        ))
    } else {
        // 結果を返さずにキャンセルされた
        ProcessingResult::Invalid(format!("handler produced no result: {e}"))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) queue: QueueName,
    pub(crate) store: Arc<dyn QueueStore>,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) settings: QueueProcessorSettings,
    pub(crate) stats: Arc<ProcessorStats>,
}

impl Worker {
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let span = tracing::info_span!("worker", queue = %self.queue, worker_id = self.id);
        async move {
            tracing::debug!("worker started");
            self.run_loop(&mut shutdown).await;
            tracing::debug!("worker stopped");
        }
        .instrument(span)
        .await
    }

    async fn run_loop(&self, shutdown: &mut watch::Receiver<bool>) {
        loop {
            if stop_requested(shutdown) {
                break;
            }

            // lease は select しない: 取れたものは必ず release まで持っていく
            match self
                .store
                .lease(&self.queue, self.settings.item_lock_duration)
                .await
            {
                Ok(Some(leased)) => {
                    self.stats.record_leased();
                    self.process(leased).await;
                }
                Ok(None) => {
                    if self.backoff(shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    self.stats.record_store_error();
                    if e.kind() == ErrorKind::Transient {
                        tracing::warn!(error = %e, "lease failed, backing off");
                    } else {
                        tracing::error!(error = %e, "lease failed, backing off");
                    }
                    if self.backoff(shutdown).await {
                        break;
                    }
                }
            }
        }
    }

    /// `thread_sleep_time` だけ眠る。先に停止が来たら起きる
    /// 戻り値が `true` ならワーカーは終了する
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.thread_sleep_time) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }

    async fn process(&self, leased: LeasedItem) {
        let item_id = leased.id;
        tracing::debug!(item_id = %item_id, "leased");

        let running = RunningItem::start(
            leased,
            self.settings.item_lock_duration,
            Arc::clone(&self.handler),
        );
        let (item_id, lease_id, expiration, result) = running.finish().await;

        if Instant::now() > expiration {
            tracing::warn!(
                item_id = %item_id,
                lock_ms = self.settings.item_lock_duration.as_millis() as u64,
                "handler outlived its lease, the item may have been delivered twice"
            );
        }

        match &result {
            ProcessingResult::UnhandledException(reason) => {
                self.stats.record_failure();
                tracing::warn!(item_id = %item_id, %reason, "handler failed, will retry");
            }
            ProcessingResult::Invalid(reason) => {
                self.stats.record_failure();
                tracing::error!(item_id = %item_id, %reason, "uninterpretable handler result, will retry");
            }
            _ => {}
        }

        let outcome = resolve(&result, self.settings.item_retry_delay);
        self.release(item_id, lease_id, outcome).await;
    }

    async fn release(&self, item_id: ItemId, lease_id: LeaseId, outcome: ReleaseOutcome) {
        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.store.release(item_id, lease_id, outcome).await {
                Ok(()) => {
                    self.record_released(item_id, outcome);
                    return;
                }
                Err(e) if e.is_stale_lease() => {
                    self.stats.record_conflict();
                    tracing::debug!(item_id = %item_id, error = %e, "lease is stale, outcome discarded");
                    return;
                }
                Err(e) if is_retryable(&e) && attempt < RELEASE_ATTEMPTS => {
                    self.stats.record_store_error();
                    tracing::warn!(item_id = %item_id, attempt, error = %e, "release failed, retrying");
                    tokio::time::sleep(self.settings.thread_sleep_time).await;
                }
                Err(e) => {
                    self.stats.record_store_error();
                    tracing::error!(
                        item_id = %item_id,
                        attempt,
                        error = %e,
                        "release failed, the lease will expire and the item be redelivered"
                    );
                    return;
                }
            }
        }
    }

    fn record_released(&self, item_id: ItemId, outcome: ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Commit => {
                self.stats.record_succeeded();
                tracing::debug!(item_id = %item_id, "committed");
            }
            ReleaseOutcome::DeadLetter => {
                self.stats.record_dead_lettered();
                tracing::error!(item_id = %item_id, "item dead-lettered");
            }
            ReleaseOutcome::RequeueAfter { delay } => {
                self.stats.record_retried();
                tracing::debug!(item_id = %item_id, delay_ms = delay.as_millis() as u64, "requeued");
            }
        }
    }
}

fn is_retryable(e: &QueueError) -> bool {
    e.kind() == ErrorKind::Transient
}

/// 停止が送られた、または sender が drop された
fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panics_become_unhandled_exceptions() {
        let handle = tokio::spawn(async {
            if true {
                panic!("kaboom");
            }
        });
        let err = handle.await.unwrap_err();
        match classify_join_error(err) {
            ProcessingResult::UnhandledException(reason) => assert!(reason.contains("kaboom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_handlers_are_invalid() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(matches!(classify_join_error(err), ProcessingResult::Invalid(_)));
    }

    #[test]
    fn dropped_sender_means_stop() {
        let (tx, rx) = watch::channel(false);
        assert!(!stop_requested(&rx));
        drop(tx);
        assert!(stop_requested(&rx));
    }
}
