//! Domain model (IDs, items, outcomes, errors, stats).

pub mod errors;
pub mod ids;
pub mod item;
pub mod outcome;
pub mod stats;

pub use self::errors::{ErrorKind, QueueError};
pub use self::ids::{ItemId, LeaseId};
pub use self::item::{LeasedItem, Payload, QueueItem, QueueName};
pub use self::outcome::{MessageProcessingResult, ProcessingResult, ReleaseOutcome};
pub use self::stats::{DeadLetter, QueueStats};
