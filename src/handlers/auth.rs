use super::common::success_response;
use crate::{
    auth::{extract_auth_from_headers, AuthError},
    events::Event,
    handlers::AppState,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

/// Describes the credential form for clients that GET the login page
async fn login_page() -> impl IntoResponse {
    success_response(json!({
        "message": "Log in to manage the inventory",
        "method": "POST",
        "action": "/login",
        "fields": ["username", "password"],
    }))
}

/// Verify credentials and issue a session token
async fn login(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<LoginForm>,
) -> Result<impl IntoResponse, AuthError> {
    let token = state
        .auth_service
        .authenticate(&payload.username, &payload.password)
        .await?;

    info!(username = %payload.username, "User logged in");
    state
        .event_sender
        .send_or_log(Event::UserLoggedIn {
            username: payload.username,
        })
        .await;

    Ok(success_response(token))
}

/// Revoke the presented session, if any, and drop its cart. Logging out
/// without a valid session is still a success.
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Ok(session) = extract_auth_from_headers(&headers, &state.auth_service).await {
        state.auth_service.revoke_session(&session.session_id).await;
        state.services.cart.clear_cart(&session.session_id);

        info!(username = %session.username, "User logged out");
        state
            .event_sender
            .send_or_log(Event::UserLoggedOut {
                username: session.username,
            })
            .await;
    }

    success_response(json!({ "message": "Logged out" }))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}
