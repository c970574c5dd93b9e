//! # Checkout Service
//!
//! Cart mutations over stored transactions.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item / update_item / remove_item                                   │
//! │                                                                         │
//! │  1. BEGIN                                                              │
//! │  2. fetch_transaction           → must exist and be Draft              │
//! │  3. load_catalog(request)       → fixed number of IN (...) queries     │
//! │  4. tally_core::price_lines     → any error aborts, nothing written    │
//! │  5. insert / update / delete items                                     │
//! │  6. aggregate_items(all items)  → totals overwritten, never patched    │
//! │  7. COMMIT                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure at any step drops the SQL transaction, which rolls back every
//! write made so far.
//!
//! ## Lifecycle
//! ```text
//!   Draft ──complete(paid == grand_total)──► Completed
//!     │                                         │
//!     └──────────────void()─────────────────────┴──► Voided
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::catalog::load_catalog;
use crate::repository::transaction::{
    delete_item, fetch_transaction, insert_item, insert_transaction, update_header, update_item,
};
use tally_core::pricing::{aggregate_items, price_item, price_lines};
use tally_core::validation::validate_cart_size;
use tally_core::{
    CatalogRequest, CoreError, LineSpec, Money, PricingContext, Transaction, TransactionItem,
    TransactionStatus, ValidationError, MAX_CART_ITEMS,
};

/// Runs cart mutations atomically against the pricing engine.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
}

impl CheckoutService {
    /// Creates a new CheckoutService.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutService { pool }
    }

    /// Gets a transaction with its items.
    pub async fn get(&self, transaction_id: &str) -> DbResult<Transaction> {
        let mut conn = self.pool.acquire().await?;
        fetch_transaction(&mut conn, transaction_id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction_id))
    }

    /// Creates a draft transaction holding `lines`.
    ///
    /// An empty `lines` creates an empty draft.
    pub async fn create_transaction(&self, lines: &[LineSpec]) -> DbResult<Transaction> {
        let result = self.try_create(lines).await;

        match &result {
            Ok(txn) => info!(
                id = %txn.id,
                items = txn.items.len(),
                total = %txn.total,
                "Transaction created"
            ),
            Err(e) => warn!(error = %e, lines = lines.len(), "Transaction rejected"),
        }

        result
    }

    async fn try_create(&self, lines: &[LineSpec]) -> DbResult<Transaction> {
        ensure_cart_size(lines.len())?;

        let now = Utc::now();
        let mut txn = Transaction::new(Uuid::new_v4().to_string(), now);

        let mut tx = self.pool.begin().await?;
        insert_transaction(&mut tx, &txn).await?;
        append_lines(&mut tx, &mut txn, lines).await?;
        tx.commit().await?;

        Ok(txn)
    }

    /// Prices `line` and appends it to a draft transaction.
    pub async fn add_item(&self, transaction_id: &str, line: &LineSpec) -> DbResult<Transaction> {
        self.add_items(transaction_id, std::slice::from_ref(line))
            .await
    }

    /// Prices every line and appends them, or appends none.
    pub async fn add_items(
        &self,
        transaction_id: &str,
        lines: &[LineSpec],
    ) -> DbResult<Transaction> {
        let result = self.try_add(transaction_id, lines).await;
        log_mutation("add", transaction_id, &result);
        result
    }

    async fn try_add(&self, transaction_id: &str, lines: &[LineSpec]) -> DbResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let mut txn = fetch_draft(&mut tx, transaction_id).await?;

        ensure_cart_size(txn.items.len() + lines.len())?;
        append_lines(&mut tx, &mut txn, lines).await?;

        tx.commit().await?;
        Ok(txn)
    }

    /// Re-prices an item from a new line request, in place.
    ///
    /// The item keeps its id and position; reference, quantity, attributes
    /// and the pricing snapshot are replaced.
    pub async fn update_item(
        &self,
        transaction_id: &str,
        item_id: &str,
        line: &LineSpec,
    ) -> DbResult<Transaction> {
        let result = self.try_update(transaction_id, item_id, line).await;
        log_mutation("update", transaction_id, &result);
        result
    }

    async fn try_update(
        &self,
        transaction_id: &str,
        item_id: &str,
        line: &LineSpec,
    ) -> DbResult<Transaction> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut txn = fetch_draft(&mut tx, transaction_id).await?;

        let index = txn
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| DbError::not_found("TransactionItem", item_id))?;

        let request = CatalogRequest::for_lines(std::slice::from_ref(line));
        let catalog = load_catalog(&mut tx, &request).await?;

        let others = txn
            .items
            .iter()
            .filter(|i| i.id != item_id)
            .filter_map(|i| i.product_id.clone())
            .collect();
        let ctx = PricingContext::for_lines(now, others, std::slice::from_ref(line));
        let priced = price_item(line, &catalog, &ctx)?;

        let item = &mut txn.items[index];
        item.apply_priced(line, &priced, now);
        update_item(&mut tx, item).await?;

        save_totals(&mut tx, &mut txn).await?;
        tx.commit().await?;
        Ok(txn)
    }

    /// Removes an item and re-aggregates the remaining lines.
    pub async fn remove_item(&self, transaction_id: &str, item_id: &str) -> DbResult<Transaction> {
        let result = self.try_remove(transaction_id, item_id).await;
        log_mutation("remove", transaction_id, &result);
        result
    }

    async fn try_remove(&self, transaction_id: &str, item_id: &str) -> DbResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let mut txn = fetch_draft(&mut tx, transaction_id).await?;

        delete_item(&mut tx, transaction_id, item_id).await?;
        txn.items.retain(|i| i.id != item_id);

        save_totals(&mut tx, &mut txn).await?;
        tx.commit().await?;
        Ok(txn)
    }

    /// Settles a draft transaction.
    ///
    /// ## Rules
    /// - At least one line
    /// - `paid` must equal the grand total exactly
    pub async fn complete(&self, transaction_id: &str, paid: Money) -> DbResult<Transaction> {
        let result = self.try_complete(transaction_id, paid).await;
        log_mutation("complete", transaction_id, &result);
        result
    }

    async fn try_complete(&self, transaction_id: &str, paid: Money) -> DbResult<Transaction> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut txn = fetch_draft(&mut tx, transaction_id).await?;

        if txn.items.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }

        let expected = txn.grand_total();
        if paid != expected {
            return Err(CoreError::PaymentMismatch { expected, paid }.into());
        }

        txn.status = TransactionStatus::Completed;
        txn.completed_at = Some(now);
        txn.updated_at = now;
        update_header(&mut tx, &txn).await?;

        tx.commit().await?;
        Ok(txn)
    }

    /// Voids a draft or completed transaction.
    pub async fn void(&self, transaction_id: &str) -> DbResult<Transaction> {
        let result = self.try_void(transaction_id).await;
        log_mutation("void", transaction_id, &result);
        result
    }

    async fn try_void(&self, transaction_id: &str) -> DbResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let mut txn = fetch_transaction(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;

        if txn.status == TransactionStatus::Voided {
            return Err(invalid_status(&txn).into());
        }

        txn.status = TransactionStatus::Voided;
        txn.updated_at = Utc::now();
        update_header(&mut tx, &txn).await?;

        tx.commit().await?;
        Ok(txn)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn log_mutation(op: &str, transaction_id: &str, result: &DbResult<Transaction>) {
    match result {
        Ok(txn) => info!(
            op = op,
            id = %transaction_id,
            status = %txn.status,
            items = txn.items.len(),
            total = %txn.total,
            total_tax = %txn.total_tax,
            "Transaction updated"
        ),
        Err(e) => warn!(op = op, id = %transaction_id, error = %e, "Transaction mutation rejected"),
    }
}

fn invalid_status(txn: &Transaction) -> CoreError {
    CoreError::InvalidTransactionStatus {
        transaction_id: txn.id.clone(),
        status: txn.status.to_string(),
    }
}

fn ensure_cart_size(lines: usize) -> Result<(), CoreError> {
    validate_cart_size(lines).map_err(|_| CoreError::CartTooLarge {
        max: MAX_CART_ITEMS,
    })
}

async fn fetch_draft(conn: &mut SqliteConnection, transaction_id: &str) -> DbResult<Transaction> {
    let txn = fetch_transaction(conn, transaction_id)
        .await?
        .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;

    if txn.status != TransactionStatus::Draft {
        return Err(invalid_status(&txn).into());
    }

    Ok(txn)
}

/// Prices `lines` against the cart, inserts them, and re-aggregates.
async fn append_lines(
    conn: &mut SqliteConnection,
    txn: &mut Transaction,
    lines: &[LineSpec],
) -> DbResult<()> {
    if lines.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let catalog = load_catalog(conn, &CatalogRequest::for_lines(lines)).await?;
    let ctx = PricingContext::for_lines(now, txn.product_ids(), lines);
    let priced = price_lines(lines, &catalog, &ctx)?;

    for (spec, line) in lines.iter().zip(&priced) {
        let item =
            TransactionItem::from_priced(Uuid::new_v4().to_string(), &txn.id, spec, line, now);
        insert_item(conn, &item).await?;
        txn.items.push(item);
    }

    save_totals(conn, txn).await
}

/// Overwrites the aggregates from every item.
async fn save_totals(conn: &mut SqliteConnection, txn: &mut Transaction) -> DbResult<()> {
    let totals = aggregate_items(&txn.items);
    txn.apply_totals(&totals);
    txn.updated_at = Utc::now();

    update_header(conn, txn).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::collections::BTreeSet;
    use tally_core::{
        Adjustment, Bundle, BundleItem, Discount, Product, ProductVariant, Promo, Rate, Tax,
    };

    fn plain(id: &str, cents: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: id.to_uppercase(),
            name: id.to_string(),
            has_variant: false,
            base_price: None,
            sell_price: Some(Money::from_cents(cents)),
            discount: None,
            promos: vec![],
            variants: vec![],
        }
    }

    /// Catalog:
    /// - shirt: $100.00, 10% discount, promo 5% at qty ≥ 2
    /// - cap: $20.00, no rules
    /// - latte: variants S $4.00 / L $5.50
    /// - combo bundle: $50.00 with 10% tax
    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let mut shirt = plain("shirt", 10_000);
        shirt.discount = Some(Discount {
            id: "ten-off".to_string(),
            name: "10% off".to_string(),
            value: Adjustment::Percentage(Rate::from_percent(10)),
            is_active: true,
            start_at: None,
            end_at: None,
        });
        shirt.promos = vec![Promo {
            id: "multi".to_string(),
            name: "Buy two".to_string(),
            value: Adjustment::Percentage(Rate::from_percent(5)),
            is_active: true,
            min_quantity: 2,
            required_product_ids: BTreeSet::new(),
        }];
        catalog.insert_product(&shirt).await.unwrap();
        catalog.insert_product(&plain("cap", 2_000)).await.unwrap();

        let mut latte = plain("latte", 0);
        latte.has_variant = true;
        latte.sell_price = None;
        latte.variants = vec![
            ProductVariant {
                id: "latte-s".to_string(),
                product_id: "latte".to_string(),
                name: "Small".to_string(),
                base_price: None,
                sell_price: Money::from_cents(400),
            },
            ProductVariant {
                id: "latte-l".to_string(),
                product_id: "latte".to_string(),
                name: "Large".to_string(),
                base_price: None,
                sell_price: Money::from_cents(550),
            },
        ];
        catalog.insert_product(&latte).await.unwrap();

        catalog
            .insert_bundle(&Bundle {
                id: "combo".to_string(),
                name: "Combo".to_string(),
                sell_price: Money::from_cents(5_000),
                base_price: None,
                tax: Some(Tax {
                    id: "vat".to_string(),
                    name: "VAT".to_string(),
                    value: Adjustment::Percentage(Rate::from_percent(10)),
                }),
                items: vec![BundleItem {
                    product_id: "cap".to_string(),
                    quantity: 2,
                }],
            })
            .await
            .unwrap();

        db
    }

    /// Re-derives aggregates from the stored items.
    fn assert_aggregates(txn: &Transaction) {
        let mut total = Money::zero();
        let mut discount = Money::zero();
        let mut promo = Money::zero();
        let mut tax = Money::zero();

        for item in &txn.items {
            total += (item.price - item.discount - item.promo).multiply_quantity(item.quantity);
            discount += item.discount.multiply_quantity(item.quantity);
            promo += item.promo.multiply_quantity(item.quantity);
            tax += item.tax;
        }

        assert_eq!(txn.total, total);
        assert_eq!(txn.total_discount, discount);
        assert_eq!(txn.total_promo, promo);
        assert_eq!(txn.total_tax, tax);
    }

    #[tokio::test]
    async fn test_create_prices_every_line() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout
            .create_transaction(&[
                LineSpec::product("shirt", 2),
                LineSpec::bundle("combo", 1),
            ])
            .await
            .unwrap();

        // shirt: 10000 - 1000 discount - 450 promo = 8550 × 2
        assert_eq!(txn.total, Money::from_cents(17_100 + 5_000));
        assert_eq!(txn.total_discount, Money::from_cents(2_000));
        assert_eq!(txn.total_promo, Money::from_cents(900));
        assert_eq!(txn.total_tax, Money::from_cents(500));
        assert_eq!(txn.grand_total(), Money::from_cents(22_600));
        assert_eq!(txn.items[0].promo_id.as_deref(), Some("multi"));
        assert_aggregates(&txn);

        let stored = checkout.get(&txn.id).await.unwrap();
        assert_eq!(stored.total, txn.total);
        assert_eq!(stored.items.len(), 2);
    }

    #[tokio::test]
    async fn test_invariant_holds_after_add_update_remove() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout.create_transaction(&[]).await.unwrap();
        assert!(txn.total.is_zero());

        let txn = checkout
            .add_item(&txn.id, &LineSpec::product("shirt", 1))
            .await
            .unwrap();
        assert_eq!(txn.total, Money::from_cents(9_000));
        assert_aggregates(&txn);

        let txn = checkout
            .add_item(&txn.id, &LineSpec::product("latte", 2).with_variant("latte-l"))
            .await
            .unwrap();
        assert_eq!(txn.total, Money::from_cents(9_000 + 1_100));
        assert_aggregates(&txn);

        // Quantity 1 → 3 makes the promo eligible.
        let shirt_id = txn.items[0].id.clone();
        let txn = checkout
            .update_item(&txn.id, &shirt_id, &LineSpec::product("shirt", 3))
            .await
            .unwrap();
        assert_eq!(txn.items[0].id, shirt_id);
        assert_eq!(txn.items[0].promo, Money::from_cents(450));
        assert_eq!(txn.total, Money::from_cents(8_550 * 3 + 1_100));
        assert_aggregates(&txn);

        let txn = checkout.remove_item(&txn.id, &shirt_id).await.unwrap();
        assert_eq!(txn.items.len(), 1);
        assert_eq!(txn.total, Money::from_cents(1_100));
        assert!(txn.total_discount.is_zero());
        assert_aggregates(&txn);

        let stored = checkout.get(&txn.id).await.unwrap();
        assert_eq!(stored.total, txn.total);
        assert_aggregates(&stored);
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout
            .create_transaction(&[LineSpec::product("cap", 1)])
            .await
            .unwrap();

        let err = checkout
            .add_items(
                &txn.id,
                &[LineSpec::product("shirt", 1), LineSpec::product("latte", 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::MissingVariant { .. })
        ));

        let stored = checkout.get(&txn.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.total, Money::from_cents(2_000));

        let err = checkout
            .create_transaction(&[LineSpec::product("ghost", 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::EntityNotFound { .. })
        ));
        assert!(db
            .transactions()
            .list_ids_by_status(TransactionStatus::Draft, 10)
            .await
            .unwrap()
            .iter()
            .all(|id| id == &txn.id));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_snapshot() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout
            .create_transaction(&[LineSpec::product("cap", 2)])
            .await
            .unwrap();
        let item_id = txn.items[0].id.clone();

        let err = checkout
            .update_item(&txn.id, &item_id, &LineSpec::product("cap", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let stored = checkout.get(&txn.id).await.unwrap();
        assert_eq!(stored.items[0].quantity, 2);
        assert_eq!(stored.total, Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn test_complete_requires_exact_payment() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout
            .create_transaction(&[LineSpec::bundle("combo", 1)])
            .await
            .unwrap();
        assert_eq!(txn.grand_total(), Money::from_cents(5_500));

        let err = checkout
            .complete(&txn.id, Money::from_cents(5_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::PaymentMismatch { .. })
        ));

        let done = checkout
            .complete(&txn.id, Money::from_cents(5_500))
            .await
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert!(done.completed_at.is_some());

        let err = checkout
            .add_item(&txn.id, &LineSpec::product("cap", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InvalidTransactionStatus { .. })
        ));

        let voided = checkout.void(&txn.id).await.unwrap();
        assert_eq!(voided.status, TransactionStatus::Voided);
        assert!(checkout.void(&txn.id).await.is_err());
    }

    #[tokio::test]
    async fn test_later_add_does_not_reprice_earlier_promo() {
        let db = seeded().await;

        let mut bagel = plain("bagel", 300);
        bagel.promos = vec![Promo {
            id: "bagel-with-cap".to_string(),
            name: "Bagel with cap".to_string(),
            value: Adjustment::Fixed(Money::from_cents(50)),
            is_active: true,
            min_quantity: 1,
            required_product_ids: ["cap".to_string()].into_iter().collect(),
        }];
        db.catalog().insert_product(&bagel).await.unwrap();

        let checkout = db.checkout();
        let txn = checkout
            .create_transaction(&[LineSpec::product("bagel", 1)])
            .await
            .unwrap();
        assert!(txn.items[0].promo.is_zero());

        let txn = checkout
            .add_item(&txn.id, &LineSpec::product("cap", 1))
            .await
            .unwrap();
        assert!(txn.items[0].promo.is_zero());
        assert_eq!(txn.items[0].promo_id, None);

        // A bagel added after the cap does qualify.
        let txn = checkout
            .add_item(&txn.id, &LineSpec::product("bagel", 1))
            .await
            .unwrap();
        assert_eq!(txn.items.len(), 3);
        assert!(txn.items[0].promo.is_zero());
        assert_eq!(txn.items[2].promo, Money::from_cents(50));
        assert_eq!(txn.total_promo, Money::from_cents(50));
        assert_aggregates(&txn);

        let stored = checkout.get(&txn.id).await.unwrap();
        let promos: Vec<i64> = stored.items.iter().map(|i| i.promo.cents()).collect();
        assert_eq!(promos, vec![0, 0, 50]);
        assert_eq!(stored.total_promo, Money::from_cents(50));
    }

    #[tokio::test]
    async fn test_empty_transaction_cannot_complete() {
        let db = seeded().await;
        let checkout = db.checkout();

        let txn = checkout.create_transaction(&[]).await.unwrap();
        let err = checkout.complete(&txn.id, Money::zero()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cart_size_limit() {
        let db = seeded().await;
        let checkout = db.checkout();

        let lines = vec![LineSpec::product("cap", 1); MAX_CART_ITEMS + 1];
        let err = checkout.create_transaction(&lines).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CartTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let db = seeded().await;
        let checkout = db.checkout();

        assert!(matches!(
            checkout.get("nope").await,
            Err(DbError::NotFound { .. })
        ));

        let txn = checkout.create_transaction(&[]).await.unwrap();
        assert!(matches!(
            checkout.remove_item(&txn.id, "nope").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
