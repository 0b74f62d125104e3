//! App - アプリケーション層
//!
//! ports を組み合わせて QueueProcessor を実装する。
//!
//! # 主要コンポーネント
//! - **QueueProcessor**: N 個のワーカーでキューを drain する
//! - **WorkerLoop**: lease → handle → resolve → release の 1 ループ
//! - **Resolver**: `ProcessingResult` → `ReleaseOutcome`
//! - **Handler**: handler trait（raw / typed）
//! - **Settings**: プロセッサ設定（TOML）

pub mod handler;
pub mod processor;
pub mod resolver;
pub mod settings;
pub mod stats;
mod worker_loop;

// 主要な型を再エクスポート
pub use self::handler::{
    FnHandler, Handler, HandlerError, Message, MessageHandler, TypedHandler, encode, handler_fn,
};
pub use self::processor::{ProcessorHandle, QueueProcessor};
pub use self::resolver::resolve;
pub use self::settings::{QueueProcessorSettings, SettingsError};
pub use self::stats::{ProcessorStats, ProcessorStatsSnapshot};
