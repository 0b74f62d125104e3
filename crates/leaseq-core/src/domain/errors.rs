//! Errors - error type and classification
//!
//! `ErrorKind` decides what a worker does locally with a failed store call:
//! - Transient: back off and poll again
//! - Conflict: the lease is stale, drop the local view silently
//! - Permanent / Configuration: surface to the operator

use thiserror::Error;

use super::ids::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Conflict,
    Permanent,
    Configuration,
}

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("lease conflict on {item_id}: the lease is no longer current")]
    LeaseConflict { item_id: ItemId },

    #[error("invalid queue name: {0:?}")]
    InvalidQueueName(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Transport(_) => ErrorKind::Transient,
            QueueError::LeaseConflict { .. } | QueueError::ItemNotFound(_) => ErrorKind::Conflict,
            QueueError::QueueNotFound(_)
            | QueueError::InvalidQueueName(_)
            | QueueError::Protocol(_) => ErrorKind::Permanent,
            QueueError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The caller's view of the item is stale (conflict or already gone).
    pub fn is_stale_lease(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn conflicts_and_missing_items_are_stale() {
        let id = ItemId::from_ulid(Ulid::new());
        assert!(QueueError::LeaseConflict { item_id: id }.is_stale_lease());
        assert!(QueueError::ItemNotFound(id).is_stale_lease());
        assert!(!QueueError::Transport("reset".into()).is_stale_lease());
    }

    #[test]
    fn transport_errors_are_transient() {
        assert_eq!(QueueError::Transport("x".into()).kind(), ErrorKind::Transient);
        assert_eq!(QueueError::QueueNotFound("q".into()).kind(), ErrorKind::Permanent);
    }
}
