use crate::{
    entities::{
        product,
        stock_transaction::{self, ActionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Per-session shopping carts held in memory, keyed by the session id
/// from the auth token. Each cart line sells exactly one unit.
///
/// Checkout runs as a single database transaction. Every line decrements
/// its product with a conditional update (`quantity > 0`), so two
/// sessions racing over the last unit cannot drive stock negative; the
/// loser's line is reported as skipped instead.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    carts: Arc<DashMap<String, Vec<CartLine>>>,
}

/// One unit of a product waiting to be sold
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: i32,
    pub name: String,
    /// Price captured when the line was added
    pub unit_price: Decimal,
}

/// Outcome of a checkout
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub sold: Vec<CartLine>,
    /// Lines whose product was out of stock or gone by checkout time
    pub skipped: Vec<CartLine>,
    pub total: Decimal,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            carts: Arc::new(DashMap::new()),
        }
    }

    /// Adds one unit of the product to the session's cart and returns the
    /// cart contents. Unknown products are rejected before anything is
    /// stored.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        session_id: &str,
        product_id: i32,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let found = product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let line = CartLine {
            product_id: found.id,
            name: found.name,
            unit_price: found.unit_price,
        };

        // Guard scope kept tight; nothing awaits while the shard is held
        let lines = {
            let mut entry = self.carts.entry(session_id.to_string()).or_default();
            entry.push(line);
            entry.clone()
        };

        self.event_sender
            .send_or_log(Event::CartLineAdded {
                session_id: session_id.to_string(),
                product_id,
            })
            .await;

        info!(
            "Cart for session {} now has {} line(s)",
            session_id,
            lines.len()
        );
        Ok(lines)
    }

    /// Snapshot of the session's cart; empty if the session has none
    pub fn cart_lines(&self, session_id: &str) -> Vec<CartLine> {
        self.carts
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Sells the cart. Each line conditionally decrements its product and
    /// appends an OUT ledger entry; lines that find no stock are skipped.
    /// The cart is dropped only after the transaction commits.
    #[instrument(skip(self))]
    pub async fn checkout(&self, session_id: &str) -> Result<CheckoutSummary, ServiceError> {
        let lines = self.cart_lines(session_id);

        if lines.is_empty() {
            return Ok(CheckoutSummary {
                sold: Vec::new(),
                skipped: Vec::new(),
                total: Decimal::ZERO,
            });
        }

        let txn = self.db.begin().await?;
        let mut sold = Vec::new();
        let mut skipped = Vec::new();

        for line in lines {
            // Touches the row only while a unit is still on hand
            let result = product::Entity::update_many()
                .col_expr(
                    product::Column::Quantity,
                    Expr::col(product::Column::Quantity).sub(1),
                )
                .filter(product::Column::Id.eq(line.product_id))
                .filter(product::Column::Quantity.gt(0))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                skipped.push(line);
                continue;
            }

            stock_transaction::ActiveModel {
                product_name: Set(line.name.clone()),
                action_type: Set(ActionType::Out.as_str().to_string()),
                qty: Set(1),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            sold.push(line);
        }

        txn.commit().await?;

        // The cart empties only once the sale is durable
        self.carts.remove(session_id);

        if !skipped.is_empty() {
            warn!(
                "Checkout for session {} skipped {} line(s) with exhausted stock",
                session_id,
                skipped.len()
            );
        }

        self.event_sender
            .send_or_log(Event::SaleCompleted {
                session_id: session_id.to_string(),
                lines_sold: sold.len(),
                lines_skipped: skipped.len(),
            })
            .await;

        let total = cart_total(&sold);
        info!(
            "Checkout complete for session {}: {} sold, {} skipped",
            session_id,
            sold.len(),
            skipped.len()
        );

        Ok(CheckoutSummary {
            sold,
            skipped,
            total,
        })
    }

    /// Drops the session's cart without selling anything
    #[instrument(skip(self))]
    pub fn clear_cart(&self, session_id: &str) {
        self.carts.remove(session_id);
        info!("Cleared cart for session {}", session_id);
    }
}

/// Sum of line prices; every line is one unit
pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(|l| l.unit_price).sum()
}
