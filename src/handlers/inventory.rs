use super::common::{created_response, success_response};
use crate::{
    auth::SessionUser,
    errors::ApiError,
    handlers::AppState,
    services::inventory::{compute_total_value, RegisterProductInput},
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Form, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn inventory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inventory", get(list_inventory))
        .route("/register", post(register_product))
        .route("/delete/:id", get(delete_product))
}

/// List products, optionally filtered by a search term, together with the
/// stock valuation and the session's cart
async fn list_inventory(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .inventory
        .list_products(params.search.as_deref())
        .await?;
    let total_value = compute_total_value(&products);
    let cart = state.services.cart.cart_lines(&session.session_id);

    Ok(success_response(json!({
        "products": products,
        "total_value": total_value,
        "cart_count": cart.len(),
        "cart": cart,
    })))
}

/// Register a new product and record its opening stock
async fn register_product(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<RegisterProductForm>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.into_input()?;

    let product = state
        .services
        .inventory
        .register_product(input)
        .await?;
    Ok(created_response(product))
}

/// Delete a product by id
async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .inventory
        .delete_product(id)
        .await?;
    Ok(success_response(
        json!({ "message": "Item deleted successfully!" }),
    ))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    search: Option<String>,
}

/// Registration form as submitted. Dates and numbers arrive as text and
/// are parsed here so a bad value comes back as a 400.
#[derive(Debug, Deserialize)]
struct RegisterProductForm {
    name: String,
    batch_number: String,
    expiry_date: String,
    quantity: String,
    unit_price: String,
    unit: String,
}

impl RegisterProductForm {
    fn into_input(self) -> Result<RegisterProductInput, ApiError> {
        let expiry_date = NaiveDate::parse_from_str(self.expiry_date.trim(), "%Y-%m-%d")
            .map_err(|e| ApiError::ValidationError(format!("Invalid expiry date: {}", e)))?;

        let quantity: i32 = self
            .quantity
            .trim()
            .parse()
            .map_err(|e| ApiError::ValidationError(format!("Invalid quantity: {}", e)))?;

        let unit_price: Decimal = self
            .unit_price
            .trim()
            .parse()
            .map_err(|e| ApiError::ValidationError(format!("Invalid unit price: {}", e)))?;

        Ok(RegisterProductInput {
            name: self.name,
            batch_number: self.batch_number,
            expiry_date,
            quantity,
            unit_price,
            unit: self.unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn form() -> RegisterProductForm {
        RegisterProductForm {
            name: "Aspirin".to_string(),
            batch_number: "B1".to_string(),
            expiry_date: "2026-12-31".to_string(),
            quantity: "100".to_string(),
            unit_price: "2.50".to_string(),
            unit: "box".to_string(),
        }
    }

    #[test]
    fn form_parses_into_typed_input() {
        let input = form().into_input().unwrap();

        assert_eq!(
            input.expiry_date,
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
        assert_eq!(input.quantity, 100);
        assert_eq!(input.unit_price, dec!(2.50));
    }

    #[test]
    fn form_tolerates_surrounding_whitespace() {
        let mut submitted = form();
        submitted.expiry_date = " 2026-12-31 ".to_string();
        submitted.quantity = " 100 ".to_string();

        let input = submitted.into_input().unwrap();
        assert_eq!(input.quantity, 100);
    }

    #[test]
    fn form_rejects_malformed_date() {
        let mut submitted = form();
        submitted.expiry_date = "31/12/2026".to_string();

        let err = submitted.into_input().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(msg) if msg.contains("expiry date")));
    }

    #[test]
    fn form_rejects_non_numeric_quantity() {
        let mut submitted = form();
        submitted.quantity = "lots".to_string();

        let err = submitted.into_input().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(msg) if msg.contains("quantity")));
    }

    #[test]
    fn form_rejects_non_numeric_price() {
        let mut submitted = form();
        submitted.unit_price = "2,50".to_string();

        let err = submitted.into_input().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(msg) if msg.contains("unit price")));
    }
}
