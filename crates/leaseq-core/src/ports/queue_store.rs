//! QueueStore port - the lease protocol
//!
//! Every implementation owns item and lease state exclusively and performs
//! each operation atomically with respect to concurrent callers. Expiry is
//! never swept in the background: eligibility is decided at `lease` time by
//! comparing lock expiration / retry time against the clock.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    ItemId, LeaseId, LeasedItem, Payload, QueueError, QueueName, QueueStats, ReleaseOutcome,
};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Declare a queue. Declaring an existing queue is a no-op.
    async fn create_queue(&self, queue: &QueueName) -> Result<(), QueueError>;

    /// Append a leasable item. Fails with `QueueNotFound` for an undeclared queue.
    async fn add(&self, queue: &QueueName, payload: Payload) -> Result<ItemId, QueueError>;

    /// Claim the oldest eligible item for `lease_duration`, or `None`.
    ///
    /// Eligible = never leased, lease expired, or retry delay elapsed.
    async fn lease(
        &self,
        queue: &QueueName,
        lease_duration: Duration,
    ) -> Result<Option<LeasedItem>, QueueError>;

    /// Resolve a lease.
    ///
    /// Returns `LeaseConflict` without touching state when `lease_id` is not
    /// the item's current lease, and `ItemNotFound` when the item is gone.
    async fn release(
        &self,
        item_id: ItemId,
        lease_id: LeaseId,
        outcome: ReleaseOutcome,
    ) -> Result<(), QueueError>;

    /// Counts for one queue.
    async fn stats(&self, queue: &QueueName) -> Result<QueueStats, QueueError>;
}
