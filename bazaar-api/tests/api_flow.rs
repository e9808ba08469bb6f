use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bazaar_api::{app, AppState};
use bazaar_core::shipping::ShippingAddress;
use bazaar_order::shipping::{MockMode, MockShippingAdapter};
use bazaar_order::{
    FeeSchedule, InMemoryOrderRepository, Order, OrderItem, OrderManager, OrderRepository,
    OrderStatus, ShipmentCoordinator,
};

fn address() -> ShippingAddress {
    ShippingAddress {
        line1: "11 Linking Road".to_string(),
        line2: None,
        city: "Mumbai".to_string(),
        state: "Maharashtra".to_string(),
        pincode: "400050".to_string(),
        phone: "9820098200".to_string(),
    }
}

fn test_app(coordinator: ShipmentCoordinator) -> (Router, Arc<InMemoryOrderRepository>) {
    let repo = Arc::new(InMemoryOrderRepository::new());
    let shipments = Arc::new(coordinator);
    let fees = FeeSchedule::default();
    let order_manager = Arc::new(OrderManager::new(repo.clone(), shipments.clone(), fees));
    let state = AppState {
        order_repo: repo.clone(),
        order_manager,
        shipments,
        fees,
    };
    (app(state), repo)
}

async fn seed_order(
    repo: &InMemoryOrderRepository,
    status: OrderStatus,
    amount: i64,
) -> Uuid {
    let mut order = Order::new("Devika Nair".to_string(), address());
    let item = OrderItem::new(order.id, Uuid::new_v4(), "Cotton kurta".to_string(), amount, 1);
    order.add_item(item);
    order.status = status;
    order.payment_reference = Some("pay_MmKs2qQxmPyYAa".to_string());
    if status == OrderStatus::Delivered {
        order.delivered_at = Some(Utc::now() - ChronoDuration::days(10));
    }
    repo.create_order(&order).await.unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(payload) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

#[tokio::test]
async fn test_advance_through_full_lifecycle() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    let id = seed_order(&repo, OrderStatus::PendingPayment, 2_499).await;

    for status in ["PLACED", "ACCEPTED", "PACKED", "SHIPPED", "DELIVERED"] {
        let (code, body) = send(
            &app,
            "POST",
            &format!("/v1/orders/{id}/advance"),
            Some(json!({"status": status, "actor": "ops@bazaar.test"})),
        )
        .await;
        assert_eq!(code, StatusCode::OK, "advance to {status} failed: {body}");
        assert_eq!(body["status"], status);
    }

    // manual AWB attached at SHIPPED
    let (_, order) = send(&app, "GET", &format!("/v1/orders/{id}"), None).await;
    let awb = order["shipping_info"]["awb_code"].as_str().unwrap();
    assert!(awb.starts_with("MAN-"));

    // trail is complete and consistent
    let (code, history) = send(&app, "GET", &format!("/v1/orders/{id}/history"), None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(history["entries"].as_array().unwrap().len(), 6);
    assert_eq!(history["consistent"], true);
}

#[tokio::test]
async fn test_invalid_transition_names_both_statuses() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    let id = seed_order(&repo, OrderStatus::Placed, 999).await;

    let (code, body) = send(
        &app,
        "POST",
        &format!("/v1/orders/{id}/advance"),
        Some(json!({"status": "DELIVERED"})),
    )
    .await;

    assert_eq!(code, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("PLACED"));
    assert!(message.contains("DELIVERED"));
}

#[tokio::test]
async fn test_advance_unknown_order_is_404() {
    let (app, _repo) = test_app(ShipmentCoordinator::manual());
    let (code, _) = send(
        &app,
        "POST",
        &format!("/v1/orders/{}/advance", Uuid::new_v4()),
        Some(json!({"status": "PLACED"})),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_courier_outage_returns_502_and_leaves_order() {
    let coordinator = ShipmentCoordinator::new(
        Some(Arc::new(MockShippingAdapter::new(MockMode::TransportFailure))),
        Duration::from_secs(1),
    );
    let (app, repo) = test_app(coordinator);
    let id = seed_order(&repo, OrderStatus::Packed, 1_500).await;

    let (code, body) = send(
        &app,
        "POST",
        &format!("/v1/orders/{id}/advance"),
        Some(json!({"status": "SHIPPED"})),
    )
    .await;

    assert_eq!(code, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("not moved"));

    let order = repo.get_order(id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Packed);
    assert!(order.shipping_info.is_none());
}

#[tokio::test]
async fn test_shipments_endpoint_attaches_awb_once() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    let id = seed_order(&repo, OrderStatus::Packed, 3_200).await;

    let (code, first) = send(
        &app,
        "POST",
        "/v1/shipments",
        Some(json!({"action": "create_order", "order_id": id})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["source"], "MANUAL");
    let awb = first["awb_code"].as_str().unwrap().to_string();

    // second call returns the same record instead of minting a new AWB
    let (_, second) = send(
        &app,
        "POST",
        "/v1/shipments",
        Some(json!({"action": "create_order", "order_id": id})),
    )
    .await;
    assert_eq!(second["awb_code"].as_str().unwrap(), awb);

    // advancing to SHIPPED reuses the attached AWB
    let (_, shipped) = send(
        &app,
        "POST",
        &format!("/v1/orders/{id}/advance"),
        Some(json!({"status": "SHIPPED"})),
    )
    .await;
    assert_eq!(shipped["shipping_info"]["awb_code"].as_str().unwrap(), awb);
}

#[tokio::test]
async fn test_label_for_manual_shipment_reports_status() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    let id = seed_order(&repo, OrderStatus::Packed, 700).await;

    let (_, created) = send(
        &app,
        "POST",
        "/v1/shipments",
        Some(json!({"action": "create_order", "order_id": id, "awb_code": "HAND-0099"})),
    )
    .await;
    assert_eq!(created["awb_code"], "HAND-0099");

    let (code, label) = send(
        &app,
        "POST",
        "/v1/shipments",
        Some(json!({"action": "generate_label", "shipment_id": "HAND-0099"})),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(label["success"], false);
    assert!(label["label_status"].as_str().unwrap().contains("label"));
}

#[tokio::test]
async fn test_settlements_report_and_filters() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    seed_order(&repo, OrderStatus::Delivered, 10_000).await; // settled (10 days ago)
    seed_order(&repo, OrderStatus::Shipped, 2_000).await; // pending
    seed_order(&repo, OrderStatus::Cancelled, 5_000).await; // excluded

    let (code, all) = send(&app, "GET", "/v1/settlements?status=all", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(all["records"].as_array().unwrap().len(), 2);
    assert_eq!(all["summary"]["gross_sales"], 12_000);

    let (_, settled) = send(&app, "GET", "/v1/settlements?status=settled", None).await;
    let records = settled["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["sale_amount"], 10_000);
    assert_eq!(records[0]["processor_fee"], 236);
    assert_eq!(records[0]["commission"], 500);
    assert_eq!(records[0]["net_payout"], 9_264);

    let (code, bad) = send(&app, "GET", "/v1/settlements?status=sideways", None).await;
    assert_eq!(code, StatusCode::BAD_REQUEST, "unexpected body: {bad}");
}

#[tokio::test]
async fn test_settlement_csv_export() {
    let (app, repo) = test_app(ShipmentCoordinator::manual());
    seed_order(&repo, OrderStatus::Delivered, 10_000).await;

    let request = Request::builder()
        .method("GET")
        .uri("/v1/settlements/export")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Order ID,Customer,Sale Amount,Processor Fee,Commission,Net Payout,Status,Payout Date"
    );
    let row = lines.next().unwrap();
    assert!(row.contains("Devika Nair"));
    assert!(row.contains("9264"));
    assert!(row.contains("SETTLED"));
}
