use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Logistics provider that produced a shipment record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingProvider {
    Manual,
    Shiprocket,
}

impl ShippingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Shiprocket => "SHIPROCKET",
        }
    }
}

/// Shipment record attached to an order once it ships.
///
/// Append-only: the AWB is never overwritten after it is first recorded;
/// only `label_url` may be filled in later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub provider: ShippingProvider,
    pub awb_code: String,
    pub tracking_url: Option<String>,
    pub label_url: Option<String>,
    #[serde(rename = "shipped_date")]
    pub shipped_at: DateTime<Utc>,
}

/// Delivery address captured at order placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub phone: String,
}

impl ShippingAddress {
    /// Reject malformed address data before any courier call is made
    pub fn validate(&self) -> CoreResult<()> {
        if self.line1.trim().is_empty() {
            return Err(CoreError::ValidationError("address line1 is empty".into()));
        }
        if self.city.trim().is_empty() {
            return Err(CoreError::ValidationError("address city is empty".into()));
        }
        if self.pincode.len() != 6 || !self.pincode.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::ValidationError(format!(
                "invalid pincode: {}",
                self.pincode
            )));
        }
        Ok(())
    }
}

/// Payload an adapter needs to register a shipment with a courier
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    pub order_id: Uuid,
    pub customer_name: String,
    pub address: ShippingAddress,
    pub amount: i64,
    pub payment_reference: Option<String>,
}

/// Successful registration with a courier
#[derive(Debug, Clone)]
pub struct ShipmentReceipt {
    pub provider: ShippingProvider,
    pub awb_code: String,
    pub tracking_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    /// Network failure or timeout reaching the provider; the shipment may
    /// or may not exist on the provider side, so this is never absorbed
    #[error("courier transport failure: {0}")]
    Transport(String),

    /// The provider understood the request and refused it
    #[error("courier rejected shipment: {0}")]
    Rejected(String),

    #[error("invalid shipment data: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait ShippingAdapter: Send + Sync {
    /// Register a shipment with the courier and obtain an AWB
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentReceipt, ShippingError>;

    /// Request a printable label URL for an existing shipment
    async fn generate_label(&self, awb_code: &str) -> Result<String, ShippingError>;
}
