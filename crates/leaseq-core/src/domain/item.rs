//! Queue names, payloads and the item records a store hands out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::QueueError;
use super::ids::{ItemId, LeaseId};

const MAX_QUEUE_NAME_LEN: usize = 128;

/// Name of a queue: 1-128 characters from `[A-Za-z0-9._-]`, so it can be
/// used verbatim as a path segment by the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Result<Self, QueueError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_QUEUE_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(QueueError::InvalidQueueName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QueueName {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque item payload. Returned byte-for-byte on lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Store-side record of one item.
///
/// `holder` and `lock_expiration` are set together, and the lease they name
/// is valid only while `lock_expiration` is in the future. Once it passes the
/// item is visible again and `release` with that token is a conflict, even
/// though the stale `holder` is only overwritten by the next `grant`.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub queue: QueueName,
    pub payload: Payload,
    pub holder: Option<LeaseId>,
    pub lock_expiration: Option<DateTime<Utc>>,
    /// Not eligible before this instant (set by `requeue_after`).
    pub not_before: Option<DateTime<Utc>>,
    /// When the item last became (or will become) eligible; orders leasing.
    pub visible_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Number of times the item has been leased.
    pub deliveries: u32,
}

impl QueueItem {
    pub fn new(id: ItemId, queue: QueueName, payload: Payload, now: DateTime<Utc>) -> Self {
        Self {
            id,
            queue,
            payload,
            holder: None,
            lock_expiration: None,
            not_before: None,
            visible_at: now,
            created_at: now,
            deliveries: 0,
        }
    }

    /// Leased right now (holder set and lock still in the future)?
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.holder.is_some() && self.lock_expiration.is_some_and(|exp| exp > now)
    }

    /// Eligible for `lease` at `now`?
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.is_leased(now) && self.not_before.is_none_or(|nb| nb <= now)
    }

    /// Grant a new lease. Caller guarantees eligibility.
    pub fn grant(&mut self, lease_id: LeaseId, expires_at: DateTime<Utc>) {
        self.holder = Some(lease_id);
        self.lock_expiration = Some(expires_at);
        self.not_before = None;
        self.visible_at = expires_at;
        self.deliveries += 1;
    }

    /// Clear the lease and hide the item until `eligible_at`.
    pub fn requeue(&mut self, eligible_at: DateTime<Utc>) {
        self.holder = None;
        self.lock_expiration = None;
        self.not_before = Some(eligible_at);
        self.visible_at = eligible_at;
    }
}

/// What `lease` returns: the item plus the token that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeasedItem {
    pub id: ItemId,
    pub data: Payload,
    pub lease_id: LeaseId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use ulid::Ulid;

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("a/b")]
    #[case(" padded")]
    #[case("has space")]
    #[case("q?x=1")]
    fn queue_name_rejects_unusable_names(#[case] raw: &str) {
        assert!(matches!(
            QueueName::new(raw),
            Err(QueueError::InvalidQueueName(_))
        ));
    }

    #[test]
    fn queue_name_deserialization_is_validated() {
        let ok: QueueName = serde_json::from_str("\"emails\"").unwrap();
        assert_eq!(ok.as_str(), "emails");
        assert!(serde_json::from_str::<QueueName>("\"\"").is_err());
    }

    #[test]
    fn lease_visibility_follows_the_clock() {
        let now = Utc::now();
        let queue = QueueName::new("q").unwrap();
        let mut item = QueueItem::new(ItemId::from_ulid(Ulid::new()), queue, "x".into(), now);
        assert!(item.is_eligible(now));

        item.grant(LeaseId::from_ulid(Ulid::new()), now + Duration::seconds(10));
        assert!(item.is_leased(now));
        assert!(!item.is_eligible(now + Duration::seconds(9)));
        assert!(item.is_eligible(now + Duration::seconds(10)));
        assert_eq!(item.deliveries, 1);

        item.requeue(now + Duration::seconds(5));
        assert!(item.holder.is_none());
        assert!(!item.is_eligible(now + Duration::seconds(4)));
        assert!(item.is_eligible(now + Duration::seconds(5)));
    }
}
