use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::shipping::ShippingError;
use bazaar_order::shipping::LabelOutcome;

use crate::error::AppError;
use crate::state::AppState;

/// POST /v1/shipments body, dispatched on `action`
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ShipmentAction {
    CreateOrder {
        order_id: Uuid,
        /// Hand-issued tracking code for the manual fallback
        awb_code: Option<String>,
    },
    GenerateLabel {
        shipment_id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct CreateShipmentResponse {
    pub success: bool,
    pub awb_code: String,
    pub tracking_url: Option<String>,
    /// Provider that issued the AWB: SHIPROCKET or MANUAL
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateLabelResponse {
    pub success: bool,
    pub label_url: Option<String>,
    pub label_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ShipmentResponse {
    Created(CreateShipmentResponse),
    Label(GenerateLabelResponse),
}

/// POST /v1/shipments
/// Logistics panel entry point: register a shipment ahead of the SHIPPED
/// transition, or fetch a label for one that exists.
pub async fn handle_shipment_action(
    State(state): State<AppState>,
    Json(action): Json<ShipmentAction>,
) -> Result<Json<ShipmentResponse>, AppError> {
    match action {
        ShipmentAction::CreateOrder { order_id, awb_code } => {
            create_shipment(state, order_id, awb_code.as_deref()).await
        }
        ShipmentAction::GenerateLabel { shipment_id } => {
            generate_label(state, &shipment_id).await
        }
    }
}

async fn create_shipment(
    state: AppState,
    order_id: Uuid,
    manual_awb: Option<&str>,
) -> Result<Json<ShipmentResponse>, AppError> {
    // 1. Fetch the order; an AWB recorded earlier is returned as-is
    let order = state
        .order_repo
        .get_order(order_id)
        .await
        .map_err(AppError::from_repo)?
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {order_id}")))?;

    if let Some(existing) = order.shipping_info {
        return Ok(Json(ShipmentResponse::Created(CreateShipmentResponse {
            success: true,
            awb_code: existing.awb_code,
            tracking_url: existing.tracking_url,
            source: existing.provider.as_str().to_string(),
        })));
    }

    // 2. Register with the courier (or fall back to a manual AWB)
    let info = state
        .shipments
        .create_shipment(&order, manual_awb)
        .await
        .map_err(|err| match err {
            ShippingError::Invalid(msg) => AppError::ValidationError(msg),
            other => AppError::BadGatewayError(other.to_string()),
        })?;

    // 3. Attach; on a race the first writer's record wins
    let attached = state
        .order_repo
        .attach_shipping_info(order_id, &info)
        .await
        .map_err(AppError::from_repo)?;

    let info = if attached {
        info
    } else {
        state
            .order_repo
            .get_order(order_id)
            .await
            .map_err(AppError::from_repo)?
            .and_then(|o| o.shipping_info)
            .ok_or_else(|| {
                AppError::InternalServerError("shipping info vanished after attach race".into())
            })?
    };

    Ok(Json(ShipmentResponse::Created(CreateShipmentResponse {
        success: true,
        awb_code: info.awb_code,
        tracking_url: info.tracking_url,
        source: info.provider.as_str().to_string(),
    })))
}

async fn generate_label(
    state: AppState,
    shipment_id: &str,
) -> Result<Json<ShipmentResponse>, AppError> {
    // 1. Resolve the AWB back to its order
    let orders = state
        .order_repo
        .list_orders()
        .await
        .map_err(AppError::from_repo)?;
    let (order_id, info) = orders
        .into_iter()
        .find_map(|o| {
            o.shipping_info
                .clone()
                .filter(|info| info.awb_code == shipment_id)
                .map(|info| (o.id, info))
        })
        .ok_or_else(|| AppError::NotFoundError(format!("Shipment not found: {shipment_id}")))?;

    // 2. Label failures never touch order state
    let response = match state.shipments.generate_label(&info).await {
        LabelOutcome::Url(url) => {
            state
                .order_repo
                .set_label_url(order_id, &url)
                .await
                .map_err(AppError::from_repo)?;
            GenerateLabelResponse {
                success: true,
                label_url: Some(url),
                label_status: None,
            }
        }
        LabelOutcome::Unavailable(status) => GenerateLabelResponse {
            success: false,
            label_url: None,
            label_status: Some(status),
        },
    };

    Ok(Json(ShipmentResponse::Label(response)))
}
