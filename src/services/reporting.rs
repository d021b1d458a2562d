use crate::{
    entities::{
        product,
        stock_transaction::{self, ActionType},
    },
    errors::ServiceError,
};
use chrono::{Duration, Local, NaiveDate};
use sea_orm::{
    sea_query::{Alias, Expr},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Stock level below which a product appears in the low stock report
pub const LOW_STOCK_THRESHOLD: i32 = 50;

/// How far ahead the expiry report looks, in days
pub const EXPIRY_WINDOW_DAYS: i64 = 180;

/// Number of entries in the top sellers list
pub const TOP_SELLERS_LIMIT: u64 = 5;

/// Read-only reporting over products and the transaction ledger
#[derive(Clone)]
pub struct ReportingService {
    db: Arc<DatabaseConnection>,
}

/// One row of the top sellers report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSeller {
    pub product_name: String,
    pub total_sold: i64,
}

/// Everything the monitoring page shows in one fetch
#[derive(Debug, Serialize)]
pub struct StockReport {
    pub low_stock: Vec<product::Model>,
    pub expiring_soon: Vec<product::Model>,
    pub top_sellers: Vec<TopSeller>,
}

impl ReportingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Products holding fewer than [`LOW_STOCK_THRESHOLD`] units, in
    /// registration order.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .filter(product::Column::Quantity.lt(LOW_STOCK_THRESHOLD))
            .order_by_asc(product::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Products whose expiry date falls within the next
    /// [`EXPIRY_WINDOW_DAYS`] days. The cutoff day itself counts.
    #[instrument(skip(self))]
    pub async fn expiring_soon(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let cutoff = today + Duration::days(EXPIRY_WINDOW_DAYS);

        Ok(product::Entity::find()
            .filter(product::Column::ExpiryDate.lte(cutoff))
            .order_by_asc(product::Column::ExpiryDate)
            .order_by_asc(product::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Best selling products by total units moved OUT. Ties are broken by
    /// product name so the ranking is stable across runs.
    #[instrument(skip(self))]
    pub async fn top_sellers(&self) -> Result<Vec<TopSeller>, ServiceError> {
        let rows: Vec<(String, i64)> = stock_transaction::Entity::find()
            .select_only()
            .column(stock_transaction::Column::ProductName)
            .column_as(Expr::col(stock_transaction::Column::Qty).sum(), "total_sold")
            .filter(stock_transaction::Column::ActionType.eq(ActionType::Out.as_str()))
            .group_by(stock_transaction::Column::ProductName)
            .order_by_desc(Expr::col(Alias::new("total_sold")))
            .order_by_asc(stock_transaction::Column::ProductName)
            .limit(TOP_SELLERS_LIMIT)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product_name, total_sold)| TopSeller {
                product_name,
                total_sold,
            })
            .collect())
    }

    /// The full ledger, newest entries first
    #[instrument(skip(self))]
    pub async fn transaction_log(&self) -> Result<Vec<stock_transaction::Model>, ServiceError> {
        Ok(stock_transaction::Entity::find()
            .order_by_desc(stock_transaction::Column::CreatedAt)
            .order_by_desc(stock_transaction::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// Assembles the monitoring report using the server's local date
    #[instrument(skip(self))]
    pub async fn stock_report(&self) -> Result<StockReport, ServiceError> {
        let today = Local::now().date_naive();

        Ok(StockReport {
            low_stock: self.low_stock().await?,
            expiring_soon: self.expiring_soon(today).await?,
            top_sellers: self.top_sellers().await?,
        })
    }
}
