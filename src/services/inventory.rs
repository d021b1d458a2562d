use crate::{
    entities::{
        product,
        stock_transaction::{self, ActionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

/// Service for registering, listing and retiring products.
///
/// Every stock movement is mirrored into the transaction ledger inside the
/// same database transaction, so the ledger and the on-hand quantities
/// never drift apart.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for registering a product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterProductInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Batch number must be 1 to 50 characters"))]
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    /// Initial stock; the opening ledger entry requires at least one unit
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
    #[validate(length(min = 1, max = 20, message = "Unit must be 1 to 20 characters"))]
    pub unit: String,
}

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("Unit price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Registers a product and writes its opening IN ledger entry.
    ///
    /// Both inserts happen in one transaction; a product never exists
    /// without its opening entry.
    #[instrument(skip(self))]
    pub async fn register_product(
        &self,
        input: RegisterProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let created = product::ActiveModel {
            name: Set(input.name.clone()),
            batch_number: Set(input.batch_number.clone()),
            expiry_date: Set(input.expiry_date),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price),
            unit: Set(input.unit.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        stock_transaction::ActiveModel {
            product_name: Set(created.name.clone()),
            action_type: Set(ActionType::In.as_str().to_string()),
            qty: Set(created.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductRegistered {
                product_id: created.id,
                name: created.name.clone(),
                quantity: created.quantity,
            })
            .await;

        info!("Registered product {} (id {})", created.name, created.id);
        Ok(created)
    }

    /// Lists products, optionally narrowed by a search term matched
    /// case-insensitively against name or batch number.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = product::Entity::find();

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            // lower() both sides so the match behaves the same on every backend
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                            .like(pattern.as_str()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::BatchNumber)))
                            .like(pattern.as_str()),
                    ),
            );
        }

        Ok(query
            .order_by_asc(product::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Fetches a single product by id
    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Deletes a product. Its ledger entries survive because they carry
    /// the product name, not a foreign key.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let found = product::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let name = found.name.clone();
        found.delete(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted {
                product_id: id,
                name: name.clone(),
            })
            .await;

        info!("Deleted product {} (id {})", name, id);
        Ok(())
    }
}

/// Total inventory value: unit price times quantity, summed over all
/// listed products.
pub fn compute_total_value(products: &[product::Model]) -> Decimal {
    products
        .iter()
        .map(|p| p.unit_price * Decimal::from(p.quantity))
        .sum()
}
