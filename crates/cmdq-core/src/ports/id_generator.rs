//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock の時刻 + ランダム部）

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{ClaimToken, DrainerId};
use crate::ports::Clock;

/// # Thread Safety
/// - `Send + Sync` を要求（複数 drainer から共有する）
pub trait IdGenerator: Send + Sync {
    fn generate_claim_token(&self) -> ClaimToken;

    fn generate_drainer_id(&self) -> DrainerId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_claim_token(&self) -> ClaimToken {
        ClaimToken::from(self.next_ulid())
    }

    fn generate_drainer_id(&self) -> DrainerId {
        DrainerId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn claim_tokens_are_unique() {
        let id_gen = UlidGenerator::new(Arc::new(SystemClock));

        let a = id_gen.generate_claim_token();
        let b = id_gen.generate_claim_token();
        let c = id_gen.generate_claim_token();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(Arc::new(FixedClock::new(fixed_time)));

        let a = id_gen.generate_claim_token();
        let b = id_gen.generate_claim_token();

        // ランダム部分があるので ID は異なるが、timestamp は同じ
        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(b.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
