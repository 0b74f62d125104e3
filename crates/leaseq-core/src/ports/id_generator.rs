//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{ItemId, LeaseId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は item id と lease token を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数 worker から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_item_id(&self) -> ItemId;

    fn generate_lease_id(&self) -> LeaseId;
}

/// Clock 駆動の ULID 生成器
///
/// - timestamp 部分は clock から、80-bit のランダム部分は `rand` から
/// - 同じミリ秒に作った token 同士でも衝突しない
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_item_id(&self) -> ItemId {
        ItemId::from(self.next())
    }

    fn generate_lease_id(&self) -> LeaseId {
        LeaseId::from(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_lease_id();
        let id2 = id_gen.generate_lease_id();
        let id3 = id_gen.generate_lease_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_item_id();
        let id2 = id_gen.generate_item_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
