use super::common::success_response;
use crate::{errors::ApiError, handlers::AppState};
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde_json::json;
use std::sync::Arc;

pub fn reports_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(monitor))
        .route("/report", get(transaction_report))
}

/// Stock monitor: low stock, near-expiry products and best sellers
async fn monitor(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reporting
        .stock_report()
        .await?;
    Ok(success_response(report))
}

/// The stock ledger, newest entries first
async fn transaction_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = state
        .services
        .reporting
        .transaction_log()
        .await?;
    Ok(success_response(json!({ "transactions": transactions })))
}
