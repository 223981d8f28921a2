//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock で timestamp を決める）

use crate::domain::ids::{InvocationId, WorkerId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は invocation / worker の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（Executor は複数タスクから共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_invocation_id(&self) -> InvocationId;

    fn generate_worker_id(&self) -> WorkerId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_invocation_id(&self) -> InvocationId {
        InvocationId::from(self.next_ulid())
    }

    fn generate_worker_id(&self) -> WorkerId {
        WorkerId::from(self.next_ulid())
    }
}
