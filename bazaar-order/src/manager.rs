use std::sync::Arc;

use bazaar_core::shipping::ShippingError;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{FeeSchedule, Order, OrderStatus};
use crate::repository::{OrderRepository, RepoError, StatusChange};
use crate::shipping::ShipmentCoordinator;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Shipping could not be arranged by any means; the order was not moved
    #[error("Shipment creation failed: {0}")]
    ShipmentCreationFailed(String),

    /// The compare-and-set lost a concurrent race; re-fetch and re-decide
    #[error("Concurrent update on order {id}: status is now {current}")]
    Conflict { id: Uuid, current: OrderStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => OrderError::NotFound(id),
            RepoError::Conflict { id, current } => OrderError::Conflict { id, current },
            RepoError::Backend(msg) => OrderError::Storage(msg),
        }
    }
}

/// The single authority for order status writes. Every change goes through
/// [`OrderManager::advance`]; no other code path may touch the status
/// field, which is what keeps the transition table and the history trail
/// trustworthy.
pub struct OrderManager {
    repo: Arc<dyn OrderRepository>,
    shipments: Arc<ShipmentCoordinator>,
    fees: FeeSchedule,
}

impl OrderManager {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        shipments: Arc<ShipmentCoordinator>,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            repo,
            shipments,
            fees,
        }
    }

    /// Move an order to `requested` if the transition table allows it from
    /// the order's current persisted status.
    ///
    /// The current status is re-read here and the commit is conditioned on
    /// it still holding at write time, so two concurrent calls can never
    /// both succeed into divergent states. The table has no self-loops, so
    /// a duplicate submission of an already-applied transition fails with
    /// `InvalidTransition` instead of double-applying.
    pub async fn advance(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        actor: Option<&str>,
    ) -> Result<Order, OrderError> {
        // 1. Re-read current state; caller-supplied state is never trusted
        let order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        let current = order.status;

        // 2. Check the transition table before any side effect
        if !current.can_transition_to(requested) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: requested,
            });
        }

        let mut change = StatusChange::to(requested, actor.map(String::from));

        // 3. SHIPPED requires shipping info; arrange it first so the record
        //    attaches atomically with the status write. An AWB recorded
        //    earlier (logistics panel) is reused, never replaced.
        if requested == OrderStatus::Shipped && order.shipping_info.is_none() {
            let info = self
                .shipments
                .create_shipment(&order, None)
                .await
                .map_err(|err| match err {
                    ShippingError::Invalid(msg) => OrderError::Validation(msg),
                    other => OrderError::ShipmentCreationFailed(other.to_string()),
                })?;
            change.shipping_info = Some(info);
        }

        // 4. DELIVERED starts the payout clock and freezes the fee rates
        if requested == OrderStatus::Delivered {
            change.delivered_at = Some(Utc::now());
            change.fee_snapshot = Some(self.fees);
        }

        // 5. Commit, conditioned on the status observed in step 1
        let updated = self.repo.transition_order(order_id, current, change).await?;

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %requested,
            actor = actor.unwrap_or("system"),
            "order status advanced"
        );
        Ok(updated)
    }
}
