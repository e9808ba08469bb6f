use std::collections::HashMap;

use async_trait::async_trait;
use bazaar_core::shipping::ShippingInfo;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{FeeSchedule, Order, OrderStatus, StatusHistoryEntry};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    /// The compare-and-set lost a race: the order's persisted status no
    /// longer matches what the caller observed
    #[error("Concurrent update on order {id}: status is now {current}")]
    Conflict { id: Uuid, current: OrderStatus },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Everything that may change in a single committed transition. The status
/// write and the history append are one unit of work; shipping info and
/// the fee snapshot attach in the same commit when present.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub changed_by: Option<String>,
    pub shipping_info: Option<ShippingInfo>,
    pub fee_snapshot: Option<FeeSchedule>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn to(status: OrderStatus, changed_by: Option<String>) -> Self {
        Self {
            status,
            changed_by,
            shipping_info: None,
            fee_snapshot: None,
            delivered_at: None,
        }
    }
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<Uuid, RepoError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError>;

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError>;

    /// Atomic compare-and-set transition: applies `change` and appends one
    /// history entry iff the persisted status still equals `expected`.
    /// Returns the updated order.
    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<Order, RepoError>;

    /// Record shipping info outside a transition (logistics panel flow).
    /// Returns `false` without touching anything if info already exists;
    /// the AWB is append-only.
    async fn attach_shipping_info(&self, id: Uuid, info: &ShippingInfo) -> Result<bool, RepoError>;

    /// Add a label URL to existing shipping info
    async fn set_label_url(&self, id: Uuid, label_url: &str) -> Result<(), RepoError>;

    /// Full status trail, ordered by change time
    async fn get_status_history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepoError>;
}

struct StoredOrder {
    order: Order,
    history: Vec<StatusHistoryEntry>,
}

/// HashMap-backed repository for tests and local tooling. The
/// compare-and-set runs under a single mutex guard, so it has the same
/// atomicity contract as the SQL store.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    inner: Mutex<HashMap<Uuid, StoredOrder>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<Uuid, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.insert(
            order.id,
            StoredOrder {
                order: order.clone(),
                history: vec![StatusHistoryEntry::new(order.id, order.status, None)],
            },
        );
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner.get(&id).map(|stored| stored.order.clone()))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner.values().map(|s| s.order.clone()).collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<Order, RepoError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        if stored.order.status != expected {
            return Err(RepoError::Conflict {
                id,
                current: stored.order.status,
            });
        }

        stored.order.status = change.status;
        stored.order.updated_at = Utc::now();
        if stored.order.shipping_info.is_none() {
            stored.order.shipping_info = change.shipping_info;
        }
        if change.fee_snapshot.is_some() {
            stored.order.fee_snapshot = change.fee_snapshot;
        }
        if change.delivered_at.is_some() {
            stored.order.delivered_at = change.delivered_at;
        }
        stored
            .history
            .push(StatusHistoryEntry::new(id, change.status, change.changed_by));

        Ok(stored.order.clone())
    }

    async fn attach_shipping_info(&self, id: Uuid, info: &ShippingInfo) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        if stored.order.shipping_info.is_some() {
            return Ok(false);
        }
        stored.order.shipping_info = Some(info.clone());
        stored.order.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_label_url(&self, id: Uuid, label_url: &str) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        match stored.order.shipping_info.as_mut() {
            Some(info) => {
                info.label_url = Some(label_url.to_string());
                stored.order.updated_at = Utc::now();
                Ok(())
            }
            None => Err(RepoError::Backend(format!(
                "order {id} has no shipping info to label"
            ))),
        }
    }

    async fn get_status_history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepoError> {
        let inner = self.inner.lock().await;
        let stored = inner.get(&id).ok_or(RepoError::NotFound(id))?;
        let mut history = stored.history.clone();
        history.sort_by_key(|e| e.changed_at);
        Ok(history)
    }
}
