//! Wholesaler API Library
//!
//! This crate provides the core functionality for the wholesaler
//! inventory service: authenticated product CRUD, a per-session cart
//! with atomic checkout, and stock monitoring reports.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{AuthService, SessionRouterExt};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth_service: Arc<AuthService>,
    pub services: handlers::AppServices,
}

/// Builds the application router.
///
/// The login, logout and health routes stay public; everything else sits
/// behind the session guard and bounces anonymous callers to `/login`.
pub fn app_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let public = Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::auth::auth_routes());

    let guarded = Router::new()
        .merge(handlers::reports::reports_routes())
        .merge(handlers::inventory::inventory_routes())
        .merge(handlers::cart::cart_routes())
        .with_session_guard();

    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    public
        .merge(guarded)
        // The session guard reads the AuthService out of request extensions
        .layer(Extension(state.auth_service.clone()))
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        // Outermost so the span maker and handlers see the assigned id
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

/// Comma-separated origin list to header values. Blank entries and
/// origins that are not valid header values are dropped.
fn parse_origin_list(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect()
}

/// Builds the CORS layer from configuration. Explicitly configured origins
/// win; otherwise permissive CORS applies only where the config allows it.
pub fn cors_layer_from_config(cfg: &config::AppConfig) -> anyhow::Result<CorsLayer> {
    let origins = cfg
        .cors_allowed_origins
        .as_deref()
        .map(parse_origin_list)
        .unwrap_or_default();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials));
    }

    if cfg.should_allow_permissive_cors() {
        tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        return Ok(CorsLayer::permissive());
    }

    anyhow::bail!(
        "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
    )
}
