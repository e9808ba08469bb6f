use bazaar_core::shipping::{ShippingAddress, ShippingInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Placed,
    Accepted,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Refunded,
}

impl OrderStatus {
    /// The transition table, encoded as data. Every status write in the
    /// system is checked against this before it happens.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            PendingPayment => &[Placed, Cancelled],
            Placed => &[Accepted, Cancelled],
            Accepted => &[Packed, Cancelled],
            Packed => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered => &[ReturnRequested],
            ReturnRequested => &[ReturnApproved, ReturnRejected, Refunded],
            ReturnApproved => &[Refunded],
            Cancelled | ReturnRejected | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns `true` if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        use OrderStatus::*;
        match self {
            PendingPayment => "PENDING_PAYMENT",
            Placed => "PLACED",
            Accepted => "ACCEPTED",
            Packed => "PACKED",
            Shipped => "SHIPPED",
            Delivered => "DELIVERED",
            Cancelled => "CANCELLED",
            ReturnRequested => "RETURN_REQUESTED",
            ReturnApproved => "RETURN_APPROVED",
            ReturnRejected => "RETURN_REJECTED",
            Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use OrderStatus::*;
        match s {
            "PENDING_PAYMENT" => Ok(PendingPayment),
            "PLACED" => Ok(Placed),
            "ACCEPTED" => Ok(Accepted),
            "PACKED" => Ok(Packed),
            "SHIPPED" => Ok(Shipped),
            "DELIVERED" => Ok(Delivered),
            "CANCELLED" => Ok(Cancelled),
            "RETURN_REQUESTED" => Ok(ReturnRequested),
            "RETURN_APPROVED" => Ok(ReturnApproved),
            "RETURN_REJECTED" => Ok(ReturnRejected),
            "REFUNDED" => Ok(Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fee rates in effect for an order's settlement.
///
/// Snapshotted onto the order at the transition to DELIVERED so that later
/// rate changes never rewrite historical settlement reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeeSchedule {
    pub processor_fee_pct: f64,
    pub commission_pct: f64,
    pub payout_hold_days: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            processor_fee_pct: 2.36,
            commission_pct: 5.0,
            payout_hold_days: 7,
        }
    }
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub shipping_info: Option<ShippingInfo>,
    pub payment_reference: Option<String>,
    pub fee_snapshot: Option<FeeSchedule>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(customer_name: String, shipping_address: ShippingAddress) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_name,
            items: Vec::new(),
            total_amount: 0,
            status: OrderStatus::PendingPayment,
            shipping_address,
            shipping_info: None,
            payment_reference: None,
            fee_snapshot: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an item to the order (only meaningful before placement)
    pub fn add_item(&mut self, item: OrderItem) {
        self.total_amount += item.price_at_purchase * i64::from(item.quantity);
        self.items.push(item);
        self.updated_at = Utc::now();
    }
}

/// An individual product within an order. `price_at_purchase` is a
/// point-in-time copy, never a live reference to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price_at_purchase: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_id: Uuid, name: String, price_at_purchase: i64, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            name,
            price_at_purchase,
            quantity,
            created_at: Utc::now(),
        }
    }
}

/// One immutable row of the status trail: who moved the order, to what
/// state, and when. `changed_by` is None for system-initiated transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub changed_by: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn new(order_id: Uuid, status: OrderStatus, changed_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            status,
            changed_by,
            changed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [
            OrderStatus::Cancelled,
            OrderStatus::ReturnRejected,
            OrderStatus::Refunded,
        ] {
            assert!(status.is_terminal());
            assert!(status.allowed_next().is_empty());
        }
    }

    #[test]
    fn test_table_has_no_self_loops() {
        use OrderStatus::*;
        for status in [
            PendingPayment,
            Placed,
            Accepted,
            Packed,
            Shipped,
            Delivered,
            Cancelled,
            ReturnRequested,
            ReturnApproved,
            ReturnRejected,
            Refunded,
        ] {
            assert!(
                !status.can_transition_to(status),
                "{status} must not transition to itself"
            );
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        let status: OrderStatus = "RETURN_REQUESTED".parse().unwrap();
        assert_eq!(status, OrderStatus::ReturnRequested);
        assert_eq!(status.as_str(), "RETURN_REQUESTED");
        assert!("SHIPPED_MAYBE".parse::<OrderStatus>().is_err());
    }
}
