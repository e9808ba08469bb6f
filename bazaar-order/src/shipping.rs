use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bazaar_core::shipping::{
    ShipmentReceipt, ShipmentRequest, ShippingAdapter, ShippingError, ShippingInfo,
    ShippingProvider,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Order;

/// Result of a label request. Provider failures are absorbed into
/// `Unavailable` here; a missing label never rolls back order state.
#[derive(Debug, Clone, Serialize)]
pub enum LabelOutcome {
    Url(String),
    Unavailable(String),
}

/// Arranges shipments with a logistics provider, falling back to a manual
/// record when no provider is configured or the provider refuses the
/// request. Transport failures and timeouts are never absorbed: the caller
/// must know the provider may have partial state.
pub struct ShipmentCoordinator {
    adapter: Option<Arc<dyn ShippingAdapter>>,
    call_timeout: Duration,
}

impl ShipmentCoordinator {
    pub fn new(adapter: Option<Arc<dyn ShippingAdapter>>, call_timeout: Duration) -> Self {
        Self {
            adapter,
            call_timeout,
        }
    }

    /// Coordinator with no live provider; every shipment gets a manual AWB
    pub fn manual() -> Self {
        Self::new(None, Duration::from_secs(10))
    }

    /// Register a shipment for `order` and return the shipping info to
    /// attach. `manual_awb` is used for the fallback record when the
    /// caller already has a hand-issued tracking code.
    pub async fn create_shipment(
        &self,
        order: &Order,
        manual_awb: Option<&str>,
    ) -> Result<ShippingInfo, ShippingError> {
        order
            .shipping_address
            .validate()
            .map_err(|e| ShippingError::Invalid(e.to_string()))?;

        let Some(adapter) = &self.adapter else {
            tracing::info!(order_id = %order.id, "no courier configured, recording manual shipment");
            return Ok(manual_fallback(order, manual_awb));
        };

        let request = ShipmentRequest {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            address: order.shipping_address.clone(),
            amount: order.total_amount,
            payment_reference: order.payment_reference.clone(),
        };

        match tokio::time::timeout(self.call_timeout, adapter.create_shipment(&request)).await {
            Err(_) => Err(ShippingError::Transport(format!(
                "courier call timed out after {:?}",
                self.call_timeout
            ))),
            Ok(Err(ShippingError::Transport(msg))) => Err(ShippingError::Transport(msg)),
            Ok(Err(err)) => {
                // Provider said no; continuity wins, but loudly
                tracing::warn!(order_id = %order.id, error = %err, "courier refused shipment, falling back to manual AWB");
                Ok(manual_fallback(order, manual_awb))
            }
            Ok(Ok(receipt)) => Ok(ShippingInfo {
                provider: receipt.provider,
                awb_code: receipt.awb_code,
                tracking_url: receipt.tracking_url,
                label_url: None,
                shipped_at: Utc::now(),
            }),
        }
    }

    /// Fetch a printable label for an existing shipment
    pub async fn generate_label(&self, info: &ShippingInfo) -> LabelOutcome {
        if let Some(url) = &info.label_url {
            return LabelOutcome::Url(url.clone());
        }
        if info.provider == ShippingProvider::Manual {
            return LabelOutcome::Unavailable("manual shipments have no printable label".into());
        }
        let Some(adapter) = &self.adapter else {
            return LabelOutcome::Unavailable("no courier configured".into());
        };

        match tokio::time::timeout(self.call_timeout, adapter.generate_label(&info.awb_code)).await
        {
            Ok(Ok(url)) => LabelOutcome::Url(url),
            Ok(Err(err)) => {
                tracing::warn!(awb = %info.awb_code, error = %err, "label generation failed");
                LabelOutcome::Unavailable(err.to_string())
            }
            Err(_) => LabelOutcome::Unavailable("label request timed out".into()),
        }
    }
}

fn manual_fallback(order: &Order, manual_awb: Option<&str>) -> ShippingInfo {
    let awb_code = match manual_awb {
        Some(code) if !code.trim().is_empty() => code.trim().to_string(),
        // Format: MAN-{timestamp}-{short order id}
        _ => {
            let timestamp = Utc::now().timestamp();
            let short_id = order.id.to_string()[..8].to_uppercase();
            format!("MAN-{timestamp}-{short_id}")
        }
    };
    ShippingInfo {
        provider: ShippingProvider::Manual,
        awb_code,
        tracking_url: None,
        label_url: None,
        shipped_at: Utc::now(),
    }
}

// ============================================================================
// Shiprocket adapter
// ============================================================================

#[derive(Debug, Clone)]
pub struct ShiprocketConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub timeout: Duration,
}

/// Live courier integration. One attempt per call, no retry loop: a retry
/// after an ambiguous failure could register the shipment twice.
pub struct ShiprocketAdapter {
    client: reqwest::Client,
    config: ShiprocketConfig,
}

impl ShiprocketAdapter {
    pub fn new(config: ShiprocketConfig) -> Result<Self, ShippingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShippingError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn authenticate(&self) -> Result<String, ShippingError> {
        #[derive(Deserialize)]
        struct AuthResponse {
            token: String,
        }

        let resp = self
            .client
            .post(format!("{}/v1/external/auth/login", self.config.base_url))
            .json(&serde_json::json!({
                "email": self.config.email,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| ShippingError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ShippingError::Rejected(format!(
                "courier auth failed: {}",
                resp.status()
            )));
        }
        let auth: AuthResponse = resp
            .json()
            .await
            .map_err(|e| ShippingError::Rejected(format!("malformed auth response: {e}")))?;
        Ok(auth.token)
    }
}

#[derive(Debug, Serialize)]
struct ForwardShipmentBody<'a> {
    order_id: String,
    billing_customer_name: &'a str,
    billing_address: &'a str,
    billing_city: &'a str,
    billing_state: &'a str,
    billing_pincode: &'a str,
    billing_phone: &'a str,
    order_amount: i64,
    payment_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct ForwardShipmentResponse {
    #[serde(default)]
    awb_code: Option<String>,
    #[serde(default)]
    courier_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    label_url: Option<String>,
}

#[async_trait]
impl ShippingAdapter for ShiprocketAdapter {
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentReceipt, ShippingError> {
        let token = self.authenticate().await?;

        let body = ForwardShipmentBody {
            order_id: request.order_id.to_string(),
            billing_customer_name: &request.customer_name,
            billing_address: &request.address.line1,
            billing_city: &request.address.city,
            billing_state: &request.address.state,
            billing_pincode: &request.address.pincode,
            billing_phone: &request.address.phone,
            order_amount: request.amount,
            payment_method: if request.payment_reference.is_some() {
                "Prepaid"
            } else {
                "COD"
            },
        };

        let resp = self
            .client
            .post(format!(
                "{}/v1/external/shipments/create/forward-shipment",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShippingError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ShippingError::Rejected(format!(
                "courier returned {status}"
            )));
        }

        let payload: ForwardShipmentResponse = resp
            .json()
            .await
            .map_err(|e| ShippingError::Rejected(format!("malformed courier response: {e}")))?;

        let awb_code = payload
            .awb_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ShippingError::Rejected("no AWB in courier response".into()))?;

        if let Some(courier) = &payload.courier_name {
            tracing::debug!(awb = %awb_code, courier = %courier, "courier assigned shipment");
        }

        Ok(ShipmentReceipt {
            provider: ShippingProvider::Shiprocket,
            tracking_url: Some(format!("https://shiprocket.co/tracking/{awb_code}")),
            awb_code,
        })
    }

    async fn generate_label(&self, awb_code: &str) -> Result<String, ShippingError> {
        let token = self.authenticate().await?;

        let resp = self
            .client
            .post(format!(
                "{}/v1/external/courier/generate/label",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "awb_code": awb_code }))
            .send()
            .await
            .map_err(|e| ShippingError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ShippingError::Rejected(format!(
                "label request returned {}",
                resp.status()
            )));
        }
        let payload: LabelResponse = resp
            .json()
            .await
            .map_err(|e| ShippingError::Rejected(format!("malformed label response: {e}")))?;
        payload
            .label_url
            .ok_or_else(|| ShippingError::Rejected("no label URL in courier response".into()))
    }
}

// ============================================================================
// Mock adapter
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Succeed,
    Reject,
    TransportFailure,
}

/// Scriptable test double for the courier boundary
pub struct MockShippingAdapter {
    mode: MockMode,
}

impl MockShippingAdapter {
    pub fn new(mode: MockMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl ShippingAdapter for MockShippingAdapter {
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentReceipt, ShippingError> {
        match self.mode {
            MockMode::Succeed => {
                let awb_code = format!("SR-{}", request.order_id.simple());
                Ok(ShipmentReceipt {
                    provider: ShippingProvider::Shiprocket,
                    tracking_url: Some(format!("https://shiprocket.co/tracking/{awb_code}")),
                    awb_code,
                })
            }
            MockMode::Reject => Err(ShippingError::Rejected(
                "simulated provider rejection".into(),
            )),
            MockMode::TransportFailure => Err(ShippingError::Transport(
                "simulated network failure".into(),
            )),
        }
    }

    async fn generate_label(&self, awb_code: &str) -> Result<String, ShippingError> {
        match self.mode {
            MockMode::Succeed => Ok(format!("https://labels.example.com/{awb_code}.pdf")),
            MockMode::Reject => Err(ShippingError::Rejected("simulated label rejection".into())),
            MockMode::TransportFailure => Err(ShippingError::Transport(
                "simulated network failure".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::shipping::ShippingAddress;

    fn test_order() -> Order {
        let mut order = Order::new(
            "Asha Verma".to_string(),
            ShippingAddress {
                line1: "14 MG Road".to_string(),
                line2: None,
                city: "Pune".to_string(),
                state: "Maharashtra".to_string(),
                pincode: "411001".to_string(),
                phone: "9800012345".to_string(),
            },
        );
        order.total_amount = 2499;
        order
    }

    #[tokio::test]
    async fn test_manual_fallback_when_unconfigured() {
        let coordinator = ShipmentCoordinator::manual();
        let order = test_order();

        let info = coordinator.create_shipment(&order, None).await.unwrap();

        assert_eq!(info.provider, ShippingProvider::Manual);
        assert!(info.awb_code.starts_with("MAN-"));
        assert!(info.tracking_url.is_none());
    }

    #[tokio::test]
    async fn test_caller_supplied_manual_awb_is_kept() {
        let coordinator = ShipmentCoordinator::manual();
        let order = test_order();

        let info = coordinator
            .create_shipment(&order, Some("HAND-0042"))
            .await
            .unwrap();

        assert_eq!(info.awb_code, "HAND-0042");
        assert_eq!(info.provider, ShippingProvider::Manual);
    }

    #[tokio::test]
    async fn test_provider_rejection_falls_back_to_manual() {
        let adapter = Arc::new(MockShippingAdapter::new(MockMode::Reject));
        let coordinator = ShipmentCoordinator::new(Some(adapter), Duration::from_secs(1));
        let order = test_order();

        let info = coordinator.create_shipment(&order, None).await.unwrap();

        assert_eq!(info.provider, ShippingProvider::Manual);
        assert!(info.awb_code.starts_with("MAN-"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let adapter = Arc::new(MockShippingAdapter::new(MockMode::TransportFailure));
        let coordinator = ShipmentCoordinator::new(Some(adapter), Duration::from_secs(1));
        let order = test_order();

        let result = coordinator.create_shipment(&order, None).await;
        assert!(matches!(result, Err(ShippingError::Transport(_))));
    }

    #[tokio::test]
    async fn test_successful_provider_shipment() {
        let adapter = Arc::new(MockShippingAdapter::new(MockMode::Succeed));
        let coordinator = ShipmentCoordinator::new(Some(adapter), Duration::from_secs(1));
        let order = test_order();

        let info = coordinator.create_shipment(&order, None).await.unwrap();

        assert_eq!(info.provider, ShippingProvider::Shiprocket);
        assert!(info.awb_code.starts_with("SR-"));
        assert!(info.tracking_url.is_some());
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_any_call() {
        let coordinator = ShipmentCoordinator::manual();
        let mut order = test_order();
        order.shipping_address.pincode = "41".to_string();

        let result = coordinator.create_shipment(&order, None).await;
        assert!(matches!(result, Err(ShippingError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_label_for_manual_shipment_is_unavailable() {
        let coordinator = ShipmentCoordinator::manual();
        let order = test_order();
        let info = coordinator.create_shipment(&order, None).await.unwrap();

        match coordinator.generate_label(&info).await {
            LabelOutcome::Unavailable(_) => {}
            LabelOutcome::Url(url) => panic!("unexpected label for manual shipment: {url}"),
        }
    }

    #[tokio::test]
    async fn test_label_failure_is_absorbed() {
        let adapter = Arc::new(MockShippingAdapter::new(MockMode::Succeed));
        let coordinator = ShipmentCoordinator::new(Some(adapter), Duration::from_secs(1));
        let order = test_order();
        let info = coordinator.create_shipment(&order, None).await.unwrap();

        // Swap in a failing adapter for the label call
        let failing = ShipmentCoordinator::new(
            Some(Arc::new(MockShippingAdapter::new(MockMode::TransportFailure))),
            Duration::from_secs(1),
        );
        match failing.generate_label(&info).await {
            LabelOutcome::Unavailable(_) => {}
            LabelOutcome::Url(url) => panic!("label call should have failed, got {url}"),
        }
    }
}
