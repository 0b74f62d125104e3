//! InMemoryQueueStore - single-process lease store
//!
//! # Layout
//! - `DashMap<QueueName, Arc<Mutex<QueueState>>>`: one lock per queue, so
//!   queues never contend with each other
//! - inside a queue, a `BTreeSet` ordered by (visible_at, seq) is the
//!   eligibility index: `lease` looks at the first entry only, which keeps
//!   it O(log n) in queue depth and gives oldest-eligible-first for free
//! - `DashMap<ItemId, QueueName>` routes `release`, which carries no queue name
//!
//! Lease expiry needs no sweeper: granting a lease re-files the item under
//! its lock expiration, so an abandoned item simply surfaces at the front of
//! the index once the clock passes it.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::{
    DeadLetter, ItemId, LeaseId, LeasedItem, Payload, QueueError, QueueItem, QueueName,
    QueueStats, ReleaseOutcome,
};
use crate::ports::{Clock, IdGenerator, QueueStore, SystemClock, UlidGenerator};

/// Dead-letter entries kept per queue for auditing.
const DEAD_LETTER_HISTORY: usize = 1000;

/// Position of an item in the eligibility index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct IndexKey {
    visible_at: DateTime<Utc>,
    seq: u64,
    id: ItemId,
}

struct Slot {
    item: QueueItem,
    key: IndexKey,
}

#[derive(Default)]
struct QueueState {
    slots: HashMap<ItemId, Slot>,
    index: BTreeSet<IndexKey>,
    next_seq: u64,
    committed: u64,
    dead_lettered: u64,
    dead_letters: VecDeque<DeadLetter>,
}

impl QueueState {
    fn file(&mut self, item: QueueItem) {
        let key = IndexKey {
            visible_at: item.visible_at,
            seq: self.next_seq,
            id: item.id,
        };
        self.next_seq += 1;
        self.index.insert(key);
        self.slots.insert(item.id, Slot { item, key });
    }

    fn unfile(&mut self, id: ItemId) -> Option<QueueItem> {
        let slot = self.slots.remove(&id)?;
        self.index.remove(&slot.key);
        Some(slot.item)
    }

    fn lease_first(
        &mut self,
        now: DateTime<Utc>,
        lease_id: LeaseId,
        expires_at: DateTime<Utc>,
    ) -> Option<LeasedItem> {
        let first = *self.index.first()?;
        if first.visible_at > now {
            return None;
        }
        let mut item = self.unfile(first.id)?;
        debug_assert!(item.is_eligible(now));

        item.grant(lease_id, expires_at);
        let leased = LeasedItem {
            id: item.id,
            data: item.payload.clone(),
            lease_id,
        };
        self.file(item);
        Some(leased)
    }

    fn release(
        &mut self,
        item_id: ItemId,
        lease_id: LeaseId,
        outcome: ReleaseOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let slot = self
            .slots
            .get(&item_id)
            .ok_or(QueueError::ItemNotFound(item_id))?;
        // an expired token is dead even if nobody has re-leased the item yet
        if slot.item.holder != Some(lease_id) || !slot.item.is_leased(now) {
            return Err(QueueError::LeaseConflict { item_id });
        }

        let Some(mut item) = self.unfile(item_id) else {
            return Err(QueueError::ItemNotFound(item_id));
        };
        match outcome {
            ReleaseOutcome::Commit => {
                self.committed += 1;
            }
            ReleaseOutcome::DeadLetter => {
                self.dead_lettered += 1;
                if self.dead_letters.len() == DEAD_LETTER_HISTORY {
                    self.dead_letters.pop_front();
                }
                self.dead_letters.push_back(DeadLetter {
                    id: item.id,
                    data: item.payload,
                    deliveries: item.deliveries,
                    created_at: item.created_at,
                    dead_lettered_at: now,
                });
            }
            ReleaseOutcome::RequeueAfter { delay } => {
                item.requeue(add_duration(now, delay));
                self.file(item);
            }
        }
        Ok(())
    }

    fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let mut stats = QueueStats {
            committed: self.committed,
            dead_lettered: self.dead_lettered,
            ..QueueStats::default()
        };
        for slot in self.slots.values() {
            let item = &slot.item;
            if item.is_leased(now) {
                stats.leased += 1;
            } else if item.is_eligible(now) {
                stats.ready += 1;
            } else {
                stats.delayed += 1;
            }
        }
        stats
    }
}

/// `now + d`, saturating at the far future.
pub(crate) fn add_duration(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// In-memory implementation of `QueueStore`.
pub struct InMemoryQueueStore {
    queues: DashMap<QueueName, Arc<Mutex<QueueState>>>,
    locations: DashMap<ItemId, QueueName>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store driven by `clock` (tests pass a `FixedClock`).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            queues: DashMap::new(),
            locations: DashMap::new(),
            clock,
            ids,
        }
    }

    /// Store with `names` already declared.
    pub fn with_queues<I>(names: I) -> Self
    where
        I: IntoIterator<Item = QueueName>,
    {
        let store = Self::new();
        for name in names {
            store.declare(name);
        }
        store
    }

    fn declare(&self, name: QueueName) {
        self.queues.entry(name).or_default();
    }

    fn queue(&self, name: &QueueName) -> Result<Arc<Mutex<QueueState>>, QueueError> {
        self.queues
            .get(name)
            .map(|q| Arc::clone(q.value()))
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    /// Most recent dead-lettered items of a queue, oldest first.
    pub async fn dead_letters(&self, name: &QueueName) -> Result<Vec<DeadLetter>, QueueError> {
        let queue = self.queue(name)?;
        let state = queue.lock().await;
        Ok(state.dead_letters.iter().cloned().collect())
    }

    /// Declared queue names, sorted.
    pub fn queue_names(&self) -> Vec<QueueName> {
        let mut names: Vec<QueueName> = self.queues.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        self.declare(queue.clone());
        Ok(())
    }

    async fn add(&self, queue: &QueueName, payload: Payload) -> Result<ItemId, QueueError> {
        let state = self.queue(queue)?;
        let id = self.ids.generate_item_id();
        let item = QueueItem::new(id, queue.clone(), payload, self.clock.now());

        // location first: a concurrent release must never miss a leasable item
        self.locations.insert(id, queue.clone());
        state.lock().await.file(item);
        tracing::debug!(queue = %queue, item = %id, "item added");
        Ok(id)
    }

    async fn lease(
        &self,
        queue: &QueueName,
        lease_duration: Duration,
    ) -> Result<Option<LeasedItem>, QueueError> {
        let state = self.queue(queue)?;
        let lease_id = self.ids.generate_lease_id();

        let mut state = state.lock().await;
        let now = self.clock.now();
        let leased = state.lease_first(now, lease_id, add_duration(now, lease_duration));
        drop(state);

        if let Some(leased) = &leased {
            tracing::debug!(queue = %queue, item = %leased.id, lease = %leased.lease_id, "item leased");
        }
        Ok(leased)
    }

    async fn release(
        &self,
        item_id: ItemId,
        lease_id: LeaseId,
        outcome: ReleaseOutcome,
    ) -> Result<(), QueueError> {
        let queue_name = self
            .locations
            .get(&item_id)
            .map(|e| e.value().clone())
            .ok_or(QueueError::ItemNotFound(item_id))?;
        let state = self.queue(&queue_name)?;

        {
            let mut state = state.lock().await;
            state.release(item_id, lease_id, outcome, self.clock.now())?;
        }
        if outcome.is_terminal() {
            self.locations.remove(&item_id);
        }
        tracing::debug!(queue = %queue_name, item = %item_id, ?outcome, "lease released");
        Ok(())
    }

    async fn stats(&self, queue: &QueueName) -> Result<QueueStats, QueueError> {
        let state = self.queue(queue)?;
        let state = state.lock().await;
        Ok(state.stats(self.clock.now()))
    }
}
