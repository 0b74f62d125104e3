//! leaseq-core
//!
//! lease ベースの at-least-once ワークキュー。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, item, outcome, stats, errors）
//! - **ports**: 抽象化レイヤー（QueueStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryQueueStore, RemoteQueueClient）
//! - **service**: HTTP の leasing サービス（protocol, handlers）
//! - **app**: QueueProcessor とワーカーループ
//! - **observability**: tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod service;

pub use crate::app::{
    MessageHandler, ProcessorHandle, QueueProcessor, QueueProcessorSettings, handler_fn,
};
pub use crate::domain::{
    ItemId, LeaseId, LeasedItem, MessageProcessingResult, Payload, QueueError, QueueName,
    ReleaseOutcome,
};
pub use crate::impls::{InMemoryQueueStore, RemoteQueueClient};
pub use crate::ports::QueueStore;
