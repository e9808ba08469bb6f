use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_order::history::{reconcile, ReconcileOutcome};
use bazaar_order::{Order, OrderStatus, StatusHistoryEntry};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AdvanceOrderRequest {
    pub status: OrderStatus,
    pub actor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderHistoryResponse {
    pub order_id: Uuid,
    pub entries: Vec<StatusHistoryEntry>,
    /// False when the trail and the persisted status disagree; a crash or
    /// an out-of-band write needs investigating
    pub consistent: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders/:id/advance
/// The only way a status changes: runs the transition through the state
/// machine, which arranges shipment on SHIPPED and freezes fees on
/// DELIVERED.
pub async fn advance_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AdvanceOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .order_manager
        .advance(order_id, req.status, req.actor.as_deref())
        .await
        .map_err(AppError::from_order)?;

    Ok(Json(order))
}

/// GET /v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .order_repo
        .get_order(order_id)
        .await
        .map_err(AppError::from_repo)?
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {order_id}")))?;

    Ok(Json(order))
}

/// GET /v1/orders
pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .order_repo
        .list_orders()
        .await
        .map_err(AppError::from_repo)?;

    Ok(Json(orders))
}

/// GET /v1/orders/:id/history
/// Full status trail plus the reconciliation check
pub async fn get_order_history(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderHistoryResponse>, AppError> {
    let order = state
        .order_repo
        .get_order(order_id)
        .await
        .map_err(AppError::from_repo)?
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {order_id}")))?;

    let entries = state
        .order_repo
        .get_status_history(order_id)
        .await
        .map_err(AppError::from_repo)?;

    let consistent = reconcile(&order, &entries) == ReconcileOutcome::Consistent;
    if !consistent {
        tracing::warn!(order_id = %order_id, "status history diverged from persisted status");
    }

    Ok(Json(OrderHistoryResponse {
        order_id,
        entries,
        consistent,
    }))
}
