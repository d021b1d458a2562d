pub mod product;
pub mod stock_transaction;
pub mod user;
