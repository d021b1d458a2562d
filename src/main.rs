use std::{net::SocketAddr, sync::Arc};

use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use wholesaler_api::{
    app_router,
    auth::{AuthConfig, AuthService},
    config, cors_layer_from_config, db,
    events::{process_events, EventSender},
    handlers::AppServices,
    AppState,
};

/// Default administrator credentials seeded on first boot
const SEED_ADMIN_USERNAME: &str = "admin";
const SEED_ADMIN_PASSWORD: &str = "password123";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Migration run failed on startup: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    // Event channel with a detached processing loop
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    // Auth service backs both the login surface and the session guard
    let auth_service = Arc::new(AuthService::new(
        AuthConfig::from_app_config(&cfg),
        db.clone(),
    ));

    // A fresh install needs an account to log in with
    if cfg.seed_admin {
        auth_service
            .ensure_user(SEED_ADMIN_USERNAME, SEED_ADMIN_PASSWORD)
            .await
            .map_err(|e| {
                error!("Seeding the admin user failed: {}", e);
                e
            })?;
        info!("Default administrator '{}' is present", SEED_ADMIN_USERNAME);
    }

    let services = AppServices::new(db.clone(), event_sender.clone());
    let state = Arc::new(AppState {
        db,
        config: cfg.clone(),
        event_sender,
        auth_service,
        services,
    });

    let cors = cors_layer_from_config(&cfg)?;
    let app = app_router(state, cors);

    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("wholesaler-api listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
