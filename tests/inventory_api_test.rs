//! Integration tests for product registration, listing, search, valuation
//! and deletion, including the IN ledger entries registration writes.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Local};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::Value;

fn expiry_in_days(days: i64) -> String {
    (Local::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

async fn transactions(app: &TestApp) -> Vec<Value> {
    let response = app.request_authenticated(Method::GET, "/report", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["transactions"]
        .as_array()
        .expect("transactions array")
        .clone()
}

// ==================== Registration Tests ====================

#[tokio::test]
async fn register_creates_product_and_one_in_transaction() {
    let app = TestApp::new().await;
    let expiry = expiry_in_days(365);

    let response = app
        .request_authenticated(
            Method::POST,
            "/register",
            Some(&[
                ("name", "Aspirin"),
                ("batch_number", "B1"),
                ("expiry_date", expiry.as_str()),
                ("quantity", "100"),
                ("unit_price", "2.50"),
                ("unit", "box"),
            ]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let product = response_json(response).await;
    assert_eq!(product["name"], "Aspirin");
    assert_eq!(product["quantity"], 100);
    assert_eq!(product["unit_price"], "2.50");
    assert!(product["id"].as_i64().is_some());

    let ledger = transactions(&app).await;
    assert_eq!(ledger.len(), 1, "registration writes exactly one entry");
    assert_eq!(ledger[0]["product_name"], "Aspirin");
    assert_eq!(ledger[0]["action_type"], "IN");
    assert_eq!(ledger[0]["qty"], 100);
}

#[tokio::test]
async fn register_rejects_malformed_expiry_date() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/register",
            Some(&[
                ("name", "Aspirin"),
                ("batch_number", "B1"),
                ("expiry_date", "31/12/2026"),
                ("quantity", "100"),
                ("unit_price", "2.50"),
                ("unit", "box"),
            ]),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(transactions(&app).await.is_empty(), "nothing was written");
}

#[tokio::test]
async fn register_rejects_zero_and_negative_quantities() {
    let app = TestApp::new().await;
    let expiry = expiry_in_days(365);

    for quantity in ["0", "-5"] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/register",
                Some(&[
                    ("name", "Aspirin"),
                    ("batch_number", "B1"),
                    ("expiry_date", expiry.as_str()),
                    ("quantity", quantity),
                    ("unit_price", "2.50"),
                    ("unit", "box"),
                ]),
            )
            .await;

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "quantity {} must be rejected",
            quantity
        );
    }

    let listing = app
        .request_authenticated(Method::GET, "/inventory", None)
        .await;
    let body = response_json(listing).await;
    assert_eq!(body["products"], serde_json::json!([]));
}

#[tokio::test]
async fn register_rejects_negative_price() {
    let app = TestApp::new().await;
    let expiry = expiry_in_days(365);

    let response = app
        .request_authenticated(
            Method::POST,
            "/register",
            Some(&[
                ("name", "Aspirin"),
                ("batch_number", "B1"),
                ("expiry_date", expiry.as_str()),
                ("quantity", "100"),
                ("unit_price", "-0.01"),
                ("unit", "box"),
            ]),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_empty_name() {
    let app = TestApp::new().await;
    let expiry = expiry_in_days(365);

    let response = app
        .request_authenticated(
            Method::POST,
            "/register",
            Some(&[
                ("name", ""),
                ("batch_number", "B1"),
                ("expiry_date", expiry.as_str()),
                ("quantity", "100"),
                ("unit_price", "2.50"),
                ("unit", "box"),
            ]),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Listing & Search Tests ====================

#[tokio::test]
async fn listing_returns_products_with_total_value_and_cart() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);

    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;
    app.seed_product("Bandage", 3, dec!(100.00), expiry).await;

    let response = app
        .request_authenticated(Method::GET, "/inventory", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 2);
    // Insertion order: id ascending
    assert_eq!(products[0]["name"], "Aspirin");
    assert_eq!(products[1]["name"], "Bandage");

    // 10 x 2.50 + 3 x 100.00
    assert_eq!(body["total_value"], "325.00");
    assert_eq!(body["cart_count"], 0);
}

#[tokio::test]
async fn search_matches_name_or_batch_number() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);

    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;
    app.seed_product("Vitamin C", 20, dec!(5.00), expiry).await;

    let by_name = app
        .request_authenticated(Method::GET, "/inventory?search=spir", None)
        .await;
    let body = response_json(by_name).await;
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Aspirin");

    // Seeded batch numbers are derived from the product name
    let by_batch = app
        .request_authenticated(Method::GET, "/inventory?search=B-VITAMIN", None)
        .await;
    let body = response_json(by_batch).await;
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Vitamin C");

    // The filtered valuation covers only the matches
    assert_eq!(body["total_value"], "100.00");
}

#[tokio::test]
async fn search_is_case_insensitive() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);

    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;

    let response = app
        .request_authenticated(Method::GET, "/inventory?search=ASPIRIN", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["products"].as_array().expect("products").len(), 1);
}

#[tokio::test]
async fn blank_search_returns_everything() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);

    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;
    app.seed_product("Bandage", 3, dec!(100.00), expiry).await;

    let response = app
        .request_authenticated(Method::GET, "/inventory?search=", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["products"].as_array().expect("products").len(), 2);
}

#[tokio::test]
async fn search_without_matches_returns_empty_list() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);

    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;

    let response = app
        .request_authenticated(Method::GET, "/inventory?search=nonexistent", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["products"], serde_json::json!([]));
    assert_eq!(body["total_value"], "0");
}

// ==================== Deletion Tests ====================

#[tokio::test]
async fn delete_removes_the_product() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);
    let product = app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;

    let response = app
        .request_authenticated(Method::GET, &format!("/delete/{}", product.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["message"], "Item deleted successfully!");

    let listing = app
        .request_authenticated(Method::GET, "/inventory", None)
        .await;
    let body = response_json(listing).await;
    assert_eq!(body["products"], serde_json::json!([]));
}

#[tokio::test]
async fn delete_keeps_the_ledger() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);
    let product = app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;

    app.request_authenticated(Method::GET, &format!("/delete/{}", product.id), None)
        .await;

    let ledger = transactions(&app).await;
    assert_eq!(ledger.len(), 1, "the IN entry outlives the product");
    assert_eq!(ledger[0]["product_name"], "Aspirin");
}

#[tokio::test]
async fn delete_missing_product_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, "/delete/9999", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_missing_product_leaves_the_store_unchanged() {
    let app = TestApp::new().await;
    let expiry = Local::now().date_naive() + Duration::days(365);
    app.seed_product("Aspirin", 10, dec!(2.50), expiry).await;

    let response = app
        .request_authenticated(Method::GET, "/delete/9999", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listing = app
        .request_authenticated(Method::GET, "/inventory", None)
        .await;
    let body = response_json(listing).await;
    assert_eq!(body["products"].as_array().expect("products").len(), 1);
    assert_eq!(transactions(&app).await.len(), 1);
}
