use crate::models::{Order, OrderStatus, StatusHistoryEntry};

/// Result of checking an order against its status trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Consistent,
    /// The persisted status and the last logged entry disagree: a crash
    /// landed between the status write and the history append, or some
    /// writer bypassed the state machine
    Diverged {
        persisted: OrderStatus,
        last_logged: Option<OrderStatus>,
    },
}

/// The status write and the history append share one transaction, so the
/// last history entry must always name the order's persisted status. This
/// check is the detection side of that invariant.
pub fn reconcile(order: &Order, history: &[StatusHistoryEntry]) -> ReconcileOutcome {
    let last_logged = history
        .iter()
        .max_by_key(|e| e.changed_at)
        .map(|e| e.status);

    if last_logged == Some(order.status) {
        ReconcileOutcome::Consistent
    } else {
        ReconcileOutcome::Diverged {
            persisted: order.status,
            last_logged,
        }
    }
}
