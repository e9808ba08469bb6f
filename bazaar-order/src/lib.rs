pub mod history;
pub mod manager;
pub mod models;
pub mod report;
pub mod repository;
pub mod settlement;
pub mod shipping;

pub use manager::{OrderError, OrderManager};
pub use models::{FeeSchedule, Order, OrderItem, OrderStatus, StatusHistoryEntry};
pub use repository::{InMemoryOrderRepository, OrderRepository, RepoError, StatusChange};
pub use shipping::{ShipmentCoordinator, ShiprocketAdapter, ShiprocketConfig};
