use std::sync::Arc;

use bazaar_order::{FeeSchedule, OrderManager, OrderRepository, ShipmentCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub order_repo: Arc<dyn OrderRepository>,
    pub order_manager: Arc<OrderManager>,
    pub shipments: Arc<ShipmentCoordinator>,
    pub fees: FeeSchedule,
}
