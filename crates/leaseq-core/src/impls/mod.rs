//! Impls - QueueStore の実装
//!
//! - **InMemoryQueueStore**: 単一プロセス用。leasing サービスの実体もこれ
//! - **RemoteQueueClient**: そのサービスと HTTP で話すクライアント

pub mod inmem_store;
pub mod remote;

pub use self::inmem_store::InMemoryQueueStore;
pub use self::remote::RemoteQueueClient;
