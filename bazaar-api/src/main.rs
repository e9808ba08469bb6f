use std::net::SocketAddr;
use std::sync::Arc;

use bazaar_api::{app, AppState};
use bazaar_core::shipping::ShippingAdapter;
use bazaar_order::{OrderManager, ShipmentCoordinator, ShiprocketAdapter, ShiprocketConfig};
use bazaar_store::{DbClient, PgOrderRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = bazaar_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Bazaar API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let order_repo = Arc::new(PgOrderRepository::new(db.pool.clone()));

    // Live courier only when fully configured; otherwise every shipment
    // gets a manual AWB
    let adapter = match (&config.shipping.email, &config.shipping.password) {
        (Some(email), Some(password)) if config.shipping.enabled => {
            let adapter = ShiprocketAdapter::new(ShiprocketConfig {
                base_url: config.shipping.base_url.clone(),
                email: email.clone(),
                password: password.clone(),
                timeout: config.shipping.call_timeout(),
            })
            .expect("Failed to build courier client");
            Some(Arc::new(adapter) as Arc<dyn ShippingAdapter>)
        }
        _ => {
            tracing::warn!("no courier configured, shipments fall back to manual AWBs");
            None
        }
    };
    let shipments = Arc::new(ShipmentCoordinator::new(
        adapter,
        config.shipping.call_timeout(),
    ));

    let fees = config.business_rules.fee_schedule();
    let order_manager = Arc::new(OrderManager::new(
        order_repo.clone(),
        shipments.clone(),
        fees,
    ));

    let app_state = AppState {
        order_repo,
        order_manager,
        shipments,
        fees,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
