//! # Transaction Repository
//!
//! Row-level storage for transactions and their priced items.
//!
//! The write functions take a `&mut SqliteConnection` so the checkout
//! service can run them inside one SQL transaction:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pool.begin()                                                          │
//! │     ├── fetch_transaction(&mut tx, id)                                 │
//! │     ├── insert_item / update_item / delete_item                        │
//! │     ├── update_header(&mut tx, &transaction)   ← totals overwritten    │
//! │     └── tx.commit()                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Money, Transaction, TransactionItem, TransactionStatus};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: String,
    status: TransactionStatus,
    total_cents: Money,
    total_discount_cents: Money,
    total_promo_cents: Money,
    total_tax_cents: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    transaction_id: String,
    product_id: Option<String>,
    product_variant_id: Option<String>,
    bundle_id: Option<String>,
    quantity: i64,
    price_cents: Money,
    discount_cents: Money,
    promo_cents: Money,
    tax_cents: Money,
    promo_id: Option<String>,
    attributes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> DbResult<TransactionItem> {
        Ok(TransactionItem {
            attributes: serde_json::from_str(&self.attributes)?,
            id: self.id,
            transaction_id: self.transaction_id,
            product_id: self.product_id,
            product_variant_id: self.product_variant_id,
            bundle_id: self.bundle_id,
            quantity: self.quantity,
            price: self.price_cents,
            discount: self.discount_cents,
            promo: self.promo_cents,
            tax: self.tax_cents,
            promo_id: self.promo_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

/// Gets a transaction with its items in insertion order.
pub async fn fetch_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Transaction>> {
    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
        SELECT
            id, status,
            total_cents, total_discount_cents, total_promo_cents, total_tax_cents,
            created_at, updated_at, completed_at
        FROM transactions
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let item_rows: Vec<ItemRow> = sqlx::query_as(
        r#"
        SELECT
            id, transaction_id, product_id, product_variant_id, bundle_id,
            quantity, price_cents, discount_cents, promo_cents, tax_cents,
            promo_id, attributes, created_at, updated_at
        FROM transaction_items
        WHERE transaction_id = ?1
        ORDER BY position
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let items = item_rows
        .into_iter()
        .map(ItemRow::into_item)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Some(Transaction {
        id: row.id,
        status: row.status,
        total: row.total_cents,
        total_discount: row.total_discount_cents,
        total_promo: row.total_promo_cents,
        total_tax: row.total_tax_cents,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
        completed_at: row.completed_at,
    }))
}

/// Inserts a transaction header (items are inserted separately).
pub async fn insert_transaction(conn: &mut SqliteConnection, txn: &Transaction) -> DbResult<()> {
    debug!(id = %txn.id, "Inserting transaction");

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, status,
            total_cents, total_discount_cents, total_promo_cents, total_tax_cents,
            created_at, updated_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&txn.id)
    .bind(txn.status)
    .bind(txn.total)
    .bind(txn.total_discount)
    .bind(txn.total_promo)
    .bind(txn.total_tax)
    .bind(txn.created_at)
    .bind(txn.updated_at)
    .bind(txn.completed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites status, aggregates and timestamps of a transaction.
pub async fn update_header(conn: &mut SqliteConnection, txn: &Transaction) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET
            status = ?2,
            total_cents = ?3,
            total_discount_cents = ?4,
            total_promo_cents = ?5,
            total_tax_cents = ?6,
            updated_at = ?7,
            completed_at = ?8
        WHERE id = ?1
        "#,
    )
    .bind(&txn.id)
    .bind(txn.status)
    .bind(txn.total)
    .bind(txn.total_discount)
    .bind(txn.total_promo)
    .bind(txn.total_tax)
    .bind(txn.updated_at)
    .bind(txn.completed_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Transaction", &txn.id));
    }

    Ok(())
}

/// Appends an item after the transaction's current last line.
pub async fn insert_item(conn: &mut SqliteConnection, item: &TransactionItem) -> DbResult<()> {
    debug!(
        transaction_id = %item.transaction_id,
        item_id = %item.id,
        quantity = item.quantity,
        "Inserting transaction item"
    );

    let attributes = serde_json::to_string(&item.attributes)?;

    sqlx::query(
        r#"
        INSERT INTO transaction_items (
            id, transaction_id, product_id, product_variant_id, bundle_id,
            quantity, price_cents, discount_cents, promo_cents, tax_cents,
            promo_id, attributes, position, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9, ?10,
            ?11, ?12,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM transaction_items WHERE transaction_id = ?2),
            ?13, ?14
        )
        "#,
    )
    .bind(&item.id)
    .bind(&item.transaction_id)
    .bind(&item.product_id)
    .bind(&item.product_variant_id)
    .bind(&item.bundle_id)
    .bind(item.quantity)
    .bind(item.price)
    .bind(item.discount)
    .bind(item.promo)
    .bind(item.tax)
    .bind(&item.promo_id)
    .bind(attributes)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites an item's reference and pricing snapshot in place.
pub async fn update_item(conn: &mut SqliteConnection, item: &TransactionItem) -> DbResult<()> {
    debug!(item_id = %item.id, quantity = item.quantity, "Updating transaction item");

    let attributes = serde_json::to_string(&item.attributes)?;

    let result = sqlx::query(
        r#"
        UPDATE transaction_items SET
            product_id = ?3,
            product_variant_id = ?4,
            bundle_id = ?5,
            quantity = ?6,
            price_cents = ?7,
            discount_cents = ?8,
            promo_cents = ?9,
            tax_cents = ?10,
            promo_id = ?11,
            attributes = ?12,
            updated_at = ?13
        WHERE id = ?1 AND transaction_id = ?2
        "#,
    )
    .bind(&item.id)
    .bind(&item.transaction_id)
    .bind(&item.product_id)
    .bind(&item.product_variant_id)
    .bind(&item.bundle_id)
    .bind(item.quantity)
    .bind(item.price)
    .bind(item.discount)
    .bind(item.promo)
    .bind(item.tax)
    .bind(&item.promo_id)
    .bind(attributes)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("TransactionItem", &item.id));
    }

    Ok(())
}

/// Deletes one item of a transaction.
pub async fn delete_item(
    conn: &mut SqliteConnection,
    transaction_id: &str,
    item_id: &str,
) -> DbResult<()> {
    debug!(transaction_id = %transaction_id, item_id = %item_id, "Deleting transaction item");

    let result = sqlx::query("DELETE FROM transaction_items WHERE id = ?1 AND transaction_id = ?2")
        .bind(item_id)
        .bind(transaction_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("TransactionItem", item_id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to stored transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Gets a transaction by ID, with items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_transaction(&mut conn, id).await
    }

    /// Lists transaction ids with the given status, newest first.
    pub async fn list_ids_by_status(
        &self,
        status: TransactionStatus,
        limit: i64,
    ) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM transactions
            WHERE status = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::pricing::{BundleLine, PricedLine, ProductLine};
    use tally_core::{Adjustment, Bundle, LineSpec, Product};

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.catalog()
            .insert_product(&Product {
                id: "tea".to_string(),
                sku: "TEA".to_string(),
                name: "Tea".to_string(),
                has_variant: false,
                base_price: None,
                sell_price: Some(Money::from_cents(250)),
                discount: None,
                promos: vec![],
                variants: vec![],
            })
            .await
            .unwrap();

        db.catalog()
            .insert_bundle(&Bundle {
                id: "combo".to_string(),
                name: "Combo".to_string(),
                sell_price: Money::from_cents(900),
                base_price: None,
                tax: Some(tally_core::Tax {
                    id: "t".to_string(),
                    name: "Tax".to_string(),
                    value: Adjustment::Fixed(Money::from_cents(10)),
                }),
                items: vec![],
            })
            .await
            .unwrap();

        db
    }

    #[tokio::test]
    async fn test_items_round_trip_in_order() {
        let db = seeded().await;
        let now = Utc::now();
        let txn = Transaction::new("t-1", now);

        let tea = LineSpec::product("tea", 2).with_attribute("sugar", "none");
        let tea_line = PricedLine::Product(ProductLine {
            product_id: "tea".to_string(),
            variant_id: None,
            price: Money::from_cents(250),
            discount: Money::zero(),
            promo: Money::zero(),
            promo_id: None,
            quantity: 2,
        });
        let combo = LineSpec::bundle("combo", 1);
        let combo_line = PricedLine::Bundle(BundleLine {
            bundle_id: "combo".to_string(),
            price: Money::from_cents(900),
            tax: Money::from_cents(10),
            quantity: 1,
        });

        let mut conn = db.pool().acquire().await.unwrap();
        insert_transaction(&mut conn, &txn).await.unwrap();
        insert_item(
            &mut conn,
            &TransactionItem::from_priced("i-1", "t-1", &tea, &tea_line, now),
        )
        .await
        .unwrap();
        insert_item(
            &mut conn,
            &TransactionItem::from_priced("i-2", "t-1", &combo, &combo_line, now),
        )
        .await
        .unwrap();
        drop(conn);

        let loaded = db.transactions().get_by_id("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, TransactionStatus::Draft);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0].id, "i-1");
        assert_eq!(loaded.items[0].attributes[0].value, "none");
        assert_eq!(loaded.items[1].bundle_id.as_deref(), Some("combo"));
        assert_eq!(loaded.items[1].tax, Money::from_cents(10));

        let drafts = db
            .transactions()
            .list_ids_by_status(TransactionStatus::Draft, 10)
            .await
            .unwrap();
        assert_eq!(drafts, vec!["t-1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_rows_report_not_found() {
        let db = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(fetch_transaction(&mut conn, "nope").await.unwrap().is_none());

        let err = delete_item(&mut conn, "nope", "nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = update_header(&mut conn, &Transaction::new("nope", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
