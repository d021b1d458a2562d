use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wholesaler_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    handlers::AppServices,
    services::inventory::RegisterProductInput,
    AppState,
};

/// Signing secret for tests; long and varied enough to pass config checks
pub const TEST_JWT_SECRET: &str =
    "integration_test_signing_secret_with_plenty_of_entropy_8a7b6c5d4e3f2109";

/// Credentials of the administrator the harness seeds
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password123";

/// Helper harness for spinning up the full application against a per-test
/// SQLite file database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    token: String,
    auth_service: Arc<AuthService>,
    _db_file: NamedTempFile,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state, a seeded
    /// administrator, and a live session for it.
    pub async fn new() -> Self {
        let db_file = NamedTempFile::new().expect("failed to create temp database file");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.path().display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&cfg),
            db_arc.clone(),
        ));
        auth_service
            .ensure_user(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .expect("failed to seed admin user");

        let services = AppServices::new(db_arc.clone(), event_sender.clone());

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg.clone(),
            event_sender,
            auth_service: auth_service.clone(),
            services,
        });

        let cors = wholesaler_api::cors_layer_from_config(&cfg).expect("cors layer for tests");
        let router = wholesaler_api::app_router(state.clone(), cors);

        // Establish the admin session the same way login does
        let token = auth_service
            .authenticate(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .expect("admin login should succeed")
            .token;

        Self {
            router,
            state,
            token,
            auth_service,
            _db_file: db_file,
            _event_task: event_task,
        }
    }

    /// Bearer token for the seeded admin session.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The auth service backing the application under test.
    #[allow(dead_code)]
    pub fn auth_service(&self) -> Arc<AuthService> {
        self.auth_service.clone()
    }

    /// Send a request against the router with an optional bearer token and
    /// an optional urlencoded form body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        form: Option<&[(&str, &str)]>,
        token: Option<&str>,
    ) -> Response {
        let mut req = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            req = req.header("authorization", format!("Bearer {}", tok));
        }

        let body = match form {
            Some(fields) => {
                req = req.header("content-type", "application/x-www-form-urlencoded");
                let encoded = serde_urlencoded::to_string(fields).expect("urlencoded form");
                Body::from(encoded)
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(req.body(body).expect("test request"))
            .await
            .expect("router calls are infallible")
    }

    /// Convenience helper for requests carrying the admin session.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Response {
        self.request(method, uri, form, Some(self.token())).await
    }

    /// POST credentials to the login endpoint.
    #[allow(dead_code)]
    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.request(
            Method::POST,
            "/login",
            Some(&[("username", username), ("password", password)]),
            None,
        )
        .await
    }

    /// Register a product through the inventory service.
    #[allow(dead_code)]
    pub async fn seed_product(
        &self,
        name: &str,
        quantity: i32,
        unit_price: Decimal,
        expiry_date: NaiveDate,
    ) -> product::Model {
        self.state
            .services
            .inventory
            .register_product(RegisterProductInput {
                name: name.to_string(),
                batch_number: format!("B-{}", name.to_uppercase().replace(' ', "-")),
                expiry_date,
                quantity,
                unit_price,
                unit: "box".to_string(),
            })
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Deserialize a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
