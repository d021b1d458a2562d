use super::common::success_response;
use crate::{auth::SessionUser, errors::ApiError, handlers::AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add_to_cart/:id", get(add_to_cart))
        .route("/checkout", post(checkout))
        .route("/clear_cart", get(clear_cart))
}

/// Put one unit of a product into the session's cart
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .add_to_cart(&session.session_id, id)
        .await?;
    Ok(success_response(json!({
        "cart_count": cart.len(),
        "cart": cart,
    })))
}

/// Sell every line in the cart that still has stock
async fn checkout(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .cart
        .checkout(&session.session_id)
        .await?;
    Ok(success_response(json!({
        "message": "Sale Completed Successfully!",
        "sold": summary.sold,
        "skipped": summary.skipped,
        "total": summary.total,
    })))
}

/// Drop the session's cart without selling anything
async fn clear_cart(State(state): State<Arc<AppState>>, session: SessionUser) -> impl IntoResponse {
    state.services.cart.clear_cart(&session.session_id);

    success_response(json!({ "message": "Cart cleared", "cart_count": 0 }))
}
