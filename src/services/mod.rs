// Core services
pub mod cart;
pub mod inventory;
pub mod reporting;

pub use cart::CartService;
pub use inventory::InventoryService;
pub use reporting::ReportingService;
