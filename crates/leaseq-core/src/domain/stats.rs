//! Queue observability views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemId;
use super::item::Payload;

/// Snapshot of one queue, computed against the store clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Eligible for lease right now.
    pub ready: usize,
    /// Held under a lease that has not expired.
    pub leased: usize,
    /// Waiting out a retry delay.
    pub delayed: usize,
    /// Removed by `commit` since the queue was declared.
    pub committed: u64,
    /// Removed by `deadLetter` since the queue was declared.
    pub dead_lettered: u64,
}

impl QueueStats {
    /// Items still in the queue.
    pub fn depth(&self) -> usize {
        self.ready + self.leased + self.delayed
    }
}

/// Audit entry for a dead-lettered item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: ItemId,
    pub data: Payload,
    /// Times the item was leased before it was given up on.
    pub deliveries: u32,
    /// When the item was added.
    pub created_at: DateTime<Utc>,
    pub dead_lettered_at: DateTime<Utc>,
}
