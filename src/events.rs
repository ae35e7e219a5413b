//! Engine events

use crate::ledger::{OrderId, Redemption};

/// Observer for side-effecting engine operations.
///
/// The dashboard collaborator implements this to react to ledger mutations —
/// an explicit interface in place of ad-hoc global notification. Quoting is
/// pure and never observed. All methods default to no-ops so implementors
/// subscribe only to what they need.
pub trait EngineObserver: Send + Sync {
    /// A redemption was recorded.
    fn on_redeemed(&self, _redemption: &Redemption) {}

    /// A recorded redemption was voided.
    fn on_voided(&self, _order_id: &OrderId) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
