pub mod auth;
pub mod cart;
pub mod common;
pub mod health;
pub mod inventory;
pub mod reports;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{CartService, InventoryService, ReportingService};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub reporting: Arc<ReportingService>,
    pub cart: Arc<CartService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(db_pool.clone(), event_sender.clone())),
            reporting: Arc::new(ReportingService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool, event_sender)),
        }
    }
}
