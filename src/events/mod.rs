use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Handle for publishing [`Event`]s onto the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.tx
            .send(event)
            .await
            .map_err(|e| format!("event channel closed: {}", e))
    }

    /// Sends an event, logging instead of surfacing the error when the
    /// processing loop is gone. Event delivery never fails a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Failed to publish event: {}", e);
        }
    }
}

/// What happened, for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Inventory events
    ProductRegistered {
        product_id: i32,
        name: String,
        quantity: i32,
    },
    ProductDeleted {
        product_id: i32,
        name: String,
    },

    // Cart and checkout events
    CartLineAdded {
        session_id: String,
        product_id: i32,
    },
    SaleCompleted {
        session_id: String,
        lines_sold: usize,
        lines_skipped: usize,
    },

    // Auth events
    UserLoggedIn {
        username: String,
    },
    UserLoggedOut {
        username: String,
    },
}

/// Drains the event channel, logging each event. Runs until every sender
/// handle is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::ProductRegistered {
                product_id,
                name,
                quantity,
            } => {
                info!(
                    "Product registered: id={}, name={}, quantity={}",
                    product_id, name, quantity
                );
            }
            Event::ProductDeleted { product_id, name } => {
                info!("Product deleted: id={}, name={}", product_id, name);
            }
            Event::CartLineAdded {
                session_id,
                product_id,
            } => {
                info!(
                    "Cart line added: session={}, product_id={}",
                    session_id, product_id
                );
            }
            Event::SaleCompleted {
                session_id,
                lines_sold,
                lines_skipped,
            } => {
                handle_sale_completed(&session_id, lines_sold, lines_skipped).await;
            }
            Event::UserLoggedIn { username } => {
                info!("User logged in: {}", username);
            }
            Event::UserLoggedOut { username } => {
                info!("User logged out: {}", username);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_sale_completed(session_id: &str, lines_sold: usize, lines_skipped: usize) {
    info!(
        "Sale completed: session={}, lines_sold={}",
        session_id, lines_sold
    );

    if lines_skipped > 0 {
        warn!(
            "Sale left {} cart line(s) unfilled for session {} due to exhausted stock",
            lines_skipped, session_id
        );
    }
}
