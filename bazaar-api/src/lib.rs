use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod finance;
pub mod orders;
pub mod shipments;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/v1/orders", get(orders::list_orders))
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/advance", post(orders::advance_order))
        .route("/v1/orders/{id}/history", get(orders::get_order_history))
        .route("/v1/shipments", post(shipments::handle_shipment_action))
        .route("/v1/settlements", get(finance::get_settlements))
        .route("/v1/settlements/export", get(finance::export_settlements_csv))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
