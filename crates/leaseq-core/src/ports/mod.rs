//! Ports - 抽象化レイヤー
//!
//! - **QueueStore**: lease プロトコル（in-memory / remote）
//! - **Clock**: 時刻
//! - **IdGenerator**: item id / lease token

pub mod clock;
pub mod id_generator;
pub mod queue_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_store::QueueStore;
