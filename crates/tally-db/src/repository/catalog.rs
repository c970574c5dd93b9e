//! # Catalog Repository
//!
//! Loads and stores the product / bundle graphs the pricing engine reads.
//!
//! ## Batched Loading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CatalogRequest { product_ids, bundle_ids }                             │
//! │       │                                                                 │
//! │       ├── bundles            WHERE id IN (...)                          │
//! │       ├── taxes              WHERE id IN (bundle.tax_id...)             │
//! │       ├── bundle_items       WHERE bundle_id IN (...)                   │
//! │       ├── products           WHERE id IN (...)                          │
//! │       ├── product_variants   WHERE product_id IN (...)                  │
//! │       ├── discounts          WHERE id IN (product.discount_id...)       │
//! │       ├── product_promos ⋈ promos  WHERE product_id IN (...)            │
//! │       └── promo_required_products  WHERE promo_id IN (...)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogSnapshot (in memory, handed to tally-core)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most eight queries per load, however many lines the cart holds.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_bundle, validate_product, validate_promo};
use tally_core::{
    Adjustment, Bundle, BundleItem, Catalog, CatalogRequest, CatalogSnapshot, CoreError, Discount,
    Money, Product, ProductListing, ProductVariant, Promo, Rate, Tax,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    has_variant: bool,
    base_price_cents: Option<Money>,
    sell_price_cents: Option<Money>,
    discount_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    name: String,
    base_price_cents: Option<Money>,
    sell_price_cents: Money,
}

#[derive(Debug, FromRow)]
struct DiscountRow {
    id: String,
    name: String,
    kind: String,
    amount: i64,
    is_active: bool,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ProductPromoRow {
    product_id: String,
    id: String,
    name: String,
    kind: String,
    amount: i64,
    is_active: bool,
    min_quantity: i64,
}

#[derive(Debug, FromRow)]
struct RequiredProductRow {
    promo_id: String,
    product_id: String,
}

#[derive(Debug, FromRow)]
struct BundleRow {
    id: String,
    name: String,
    sell_price_cents: Money,
    base_price_cents: Option<Money>,
    tax_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct TaxRow {
    id: String,
    name: String,
    kind: String,
    amount: i64,
}

#[derive(Debug, FromRow)]
struct BundleItemRow {
    bundle_id: String,
    product_id: String,
    quantity: i64,
}

// =============================================================================
// Adjustment Columns
// =============================================================================

/// Maps stored `(kind, amount)` back to an [`Adjustment`].
fn decode_adjustment(kind: &str, amount: i64) -> DbResult<Adjustment> {
    match kind {
        "percentage" => u32::try_from(amount)
            .map(|bps| Adjustment::Percentage(Rate::from_bps(bps)))
            .map_err(|_| DbError::InvalidData(format!("percentage out of range: {amount}"))),
        "fixed" => Ok(Adjustment::Fixed(Money::from_cents(amount))),
        other => Err(DbError::InvalidData(format!(
            "unknown adjustment kind '{other}'"
        ))),
    }
}

fn encode_adjustment(value: &Adjustment) -> (&'static str, i64) {
    match value {
        Adjustment::Percentage(rate) => ("percentage", i64::from(rate.bps())),
        Adjustment::Fixed(amount) => ("fixed", amount.cents()),
    }
}

impl DiscountRow {
    fn into_discount(self) -> DbResult<Discount> {
        Ok(Discount {
            value: decode_adjustment(&self.kind, self.amount)?,
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            start_at: self.start_at,
            end_at: self.end_at,
        })
    }
}

impl TaxRow {
    fn into_tax(self) -> DbResult<Tax> {
        Ok(Tax {
            value: decode_adjustment(&self.kind, self.amount)?,
            id: self.id,
            name: self.name,
        })
    }
}

// =============================================================================
// Batched Loading
// =============================================================================

/// Runs `select WHERE column IN (ids) order_by`, or nothing when `ids` is empty.
async fn fetch_in<R>(
    conn: &mut SqliteConnection,
    select: &str,
    column: &str,
    ids: &BTreeSet<String>,
    order_by: &str,
) -> DbResult<Vec<R>>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(select);
    qb.push(" WHERE ");
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(") ");
    qb.push(order_by);

    let rows = qb.build_query_as::<R>().fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Loads every entity `request` names, with their full graphs.
///
/// Ids that do not exist are simply absent from the snapshot; pricing
/// reports them as `EntityNotFound`.
pub async fn load_catalog(
    conn: &mut SqliteConnection,
    request: &CatalogRequest,
) -> DbResult<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::new();

    if request.is_empty() {
        return Ok(snapshot);
    }

    load_bundles(conn, &request.bundle_ids, &mut snapshot).await?;
    load_products(conn, &request.product_ids, &mut snapshot).await?;

    debug!(
        products = request.product_ids.len(),
        bundles = request.bundle_ids.len(),
        "Catalog loaded"
    );

    Ok(snapshot)
}

async fn load_bundles(
    conn: &mut SqliteConnection,
    ids: &BTreeSet<String>,
    snapshot: &mut CatalogSnapshot,
) -> DbResult<()> {
    let rows: Vec<BundleRow> = fetch_in(
        conn,
        "SELECT id, name, sell_price_cents, base_price_cents, tax_id FROM bundles",
        "id",
        ids,
        "",
    )
    .await?;

    if rows.is_empty() {
        return Ok(());
    }

    let found: BTreeSet<String> = rows.iter().map(|r| r.id.clone()).collect();
    let tax_ids: BTreeSet<String> = rows.iter().filter_map(|r| r.tax_id.clone()).collect();

    let mut taxes: HashMap<String, Tax> = HashMap::new();
    for row in fetch_in::<TaxRow>(
        conn,
        "SELECT id, name, kind, amount FROM taxes",
        "id",
        &tax_ids,
        "",
    )
    .await?
    {
        let tax = row.into_tax()?;
        taxes.insert(tax.id.clone(), tax);
    }

    let mut items: HashMap<String, Vec<BundleItem>> = HashMap::new();
    for row in fetch_in::<BundleItemRow>(
        conn,
        "SELECT bundle_id, product_id, quantity FROM bundle_items",
        "bundle_id",
        &found,
        "ORDER BY bundle_id, position",
    )
    .await?
    {
        items.entry(row.bundle_id).or_default().push(BundleItem {
            product_id: row.product_id,
            quantity: row.quantity,
        });
    }

    for row in rows {
        let tax = row.tax_id.as_ref().and_then(|id| taxes.get(id).cloned());
        let bundle_items = items.remove(&row.id).unwrap_or_default();

        snapshot.insert_bundle(Bundle {
            id: row.id,
            name: row.name,
            sell_price: row.sell_price_cents,
            base_price: row.base_price_cents,
            tax,
            items: bundle_items,
        });
    }

    Ok(())
}

async fn load_products(
    conn: &mut SqliteConnection,
    ids: &BTreeSet<String>,
    snapshot: &mut CatalogSnapshot,
) -> DbResult<()> {
    let rows: Vec<ProductRow> = fetch_in(
        conn,
        "SELECT id, sku, name, has_variant, base_price_cents, sell_price_cents, discount_id \
         FROM products",
        "id",
        ids,
        "",
    )
    .await?;

    if rows.is_empty() {
        return Ok(());
    }

    let found: BTreeSet<String> = rows.iter().map(|r| r.id.clone()).collect();
    let discount_ids: BTreeSet<String> =
        rows.iter().filter_map(|r| r.discount_id.clone()).collect();

    let mut variants: HashMap<String, Vec<ProductVariant>> = HashMap::new();
    for row in fetch_in::<VariantRow>(
        conn,
        "SELECT id, product_id, name, base_price_cents, sell_price_cents FROM product_variants",
        "product_id",
        &found,
        "ORDER BY product_id, position",
    )
    .await?
    {
        variants
            .entry(row.product_id.clone())
            .or_default()
            .push(ProductVariant {
                id: row.id,
                product_id: row.product_id,
                name: row.name,
                base_price: row.base_price_cents,
                sell_price: row.sell_price_cents,
            });
    }

    let mut discounts: HashMap<String, Discount> = HashMap::new();
    for row in fetch_in::<DiscountRow>(
        conn,
        "SELECT id, name, kind, amount, is_active, start_at, end_at FROM discounts",
        "id",
        &discount_ids,
        "",
    )
    .await?
    {
        let discount = row.into_discount()?;
        discounts.insert(discount.id.clone(), discount);
    }

    let promo_rows: Vec<ProductPromoRow> = fetch_in(
        conn,
        "SELECT pp.product_id, p.id, p.name, p.kind, p.amount, p.is_active, p.min_quantity \
         FROM product_promos pp JOIN promos p ON p.id = pp.promo_id",
        "pp.product_id",
        &found,
        "ORDER BY pp.product_id, pp.position",
    )
    .await?;

    let promo_ids: BTreeSet<String> = promo_rows.iter().map(|r| r.id.clone()).collect();
    let mut required: HashMap<String, BTreeSet<String>> = HashMap::new();
    for row in fetch_in::<RequiredProductRow>(
        conn,
        "SELECT promo_id, product_id FROM promo_required_products",
        "promo_id",
        &promo_ids,
        "",
    )
    .await?
    {
        required.entry(row.promo_id).or_default().insert(row.product_id);
    }

    let mut promos: HashMap<String, Vec<Promo>> = HashMap::new();
    for row in promo_rows {
        let promo = Promo {
            value: decode_adjustment(&row.kind, row.amount)?,
            required_product_ids: required.get(&row.id).cloned().unwrap_or_default(),
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            min_quantity: row.min_quantity,
        };
        promos.entry(row.product_id).or_default().push(promo);
    }

    for row in rows {
        let discount = row
            .discount_id
            .as_ref()
            .and_then(|id| discounts.get(id).cloned());

        snapshot.insert_product(Product {
            discount,
            promos: promos.remove(&row.id).unwrap_or_default(),
            variants: variants.remove(&row.id).unwrap_or_default(),
            id: row.id,
            sku: row.sku,
            name: row.name,
            has_variant: row.has_variant,
            base_price: row.base_price_cents,
            sell_price: row.sell_price_cents,
        });
    }

    Ok(())
}

// =============================================================================
// Writes
// =============================================================================

async fn upsert_discount(conn: &mut SqliteConnection, discount: &Discount) -> DbResult<()> {
    let (kind, amount) = encode_adjustment(&discount.value);

    sqlx::query(
        r#"
        INSERT INTO discounts (id, name, kind, amount, is_active, start_at, end_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            amount = excluded.amount,
            is_active = excluded.is_active,
            start_at = excluded.start_at,
            end_at = excluded.end_at
        "#,
    )
    .bind(&discount.id)
    .bind(&discount.name)
    .bind(kind)
    .bind(amount)
    .bind(discount.is_active)
    .bind(discount.start_at)
    .bind(discount.end_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn upsert_promo(conn: &mut SqliteConnection, promo: &Promo) -> DbResult<()> {
    let (kind, amount) = encode_adjustment(&promo.value);

    sqlx::query(
        r#"
        INSERT INTO promos (id, name, kind, amount, is_active, min_quantity)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            amount = excluded.amount,
            is_active = excluded.is_active,
            min_quantity = excluded.min_quantity
        "#,
    )
    .bind(&promo.id)
    .bind(&promo.name)
    .bind(kind)
    .bind(amount)
    .bind(promo.is_active)
    .bind(promo.min_quantity)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM promo_required_products WHERE promo_id = ?1")
        .bind(&promo.id)
        .execute(&mut *conn)
        .await?;

    for product_id in &promo.required_product_ids {
        sqlx::query("INSERT INTO promo_required_products (promo_id, product_id) VALUES (?1, ?2)")
            .bind(&promo.id)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn upsert_tax(conn: &mut SqliteConnection, tax: &Tax) -> DbResult<()> {
    let (kind, amount) = encode_adjustment(&tax.value);

    sqlx::query(
        r#"
        INSERT INTO taxes (id, name, kind, amount)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            amount = excluded.amount
        "#,
    )
    .bind(&tax.id)
    .bind(&tax.name)
    .bind(kind)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Loads a snapshot for `request` with a fixed number of queries.
    pub async fn load(&self, request: &CatalogRequest) -> DbResult<CatalogSnapshot> {
        let mut conn = self.pool.acquire().await?;
        load_catalog(&mut conn, request).await
    }

    /// Gets one product with its variants, discount and promos.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let mut request = CatalogRequest::default();
        request.product_ids.insert(id.to_string());

        let snapshot = self.load(&request).await?;
        Ok(snapshot.product(id).cloned())
    }

    /// Gets one bundle with its items and tax.
    pub async fn get_bundle(&self, id: &str) -> DbResult<Option<Bundle>> {
        let mut request = CatalogRequest::default();
        request.bundle_ids.insert(id.to_string());

        let snapshot = self.load(&request).await?;
        Ok(snapshot.bundle(id).cloned())
    }

    /// Display listing for a product at `now`.
    pub async fn listing(&self, id: &str, now: DateTime<Utc>) -> DbResult<Option<ProductListing>> {
        let product = self.get_product(id).await?;
        Ok(product.map(|p| ProductListing::from_product(&p, now)))
    }

    /// Counts stored products.
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Inserts a standalone promo (upserts by id).
    pub async fn insert_promo(&self, promo: &Promo) -> DbResult<()> {
        validate_promo(promo).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        upsert_promo(&mut tx, promo).await?;
        tx.commit().await?;

        debug!(id = %promo.id, "Promo stored");
        Ok(())
    }

    /// Inserts a product graph: product, variants, discount and promos.
    ///
    /// ## Ordering
    /// `product.promos` order is stored as the selection order.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        validate_product(product).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(discount) = &product.discount {
            upsert_discount(&mut tx, discount).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, has_variant,
                base_price_cents, sell_price_cents, discount_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(product.has_variant)
        .bind(product.base_price)
        .bind(product.sell_price)
        .bind(product.discount.as_ref().map(|d| d.id.as_str()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, variant) in product.variants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (
                    id, product_id, name, base_price_cents, sell_price_cents, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&variant.id)
            .bind(&product.id)
            .bind(variant.name.trim())
            .bind(variant.base_price)
            .bind(variant.sell_price)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (position, promo) in product.promos.iter().enumerate() {
            upsert_promo(&mut tx, promo).await?;

            sqlx::query(
                "INSERT INTO product_promos (product_id, promo_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(&product.id)
            .bind(&promo.id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %product.id,
            sku = %product.sku,
            variants = product.variants.len(),
            promos = product.promos.len(),
            "Product stored"
        );
        Ok(())
    }

    /// Inserts a bundle with its items and tax.
    pub async fn insert_bundle(&self, bundle: &Bundle) -> DbResult<()> {
        validate_bundle(bundle).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(tax) = &bundle.tax {
            upsert_tax(&mut tx, tax).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO bundles (
                id, name, sell_price_cents, base_price_cents, tax_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&bundle.id)
        .bind(bundle.name.trim())
        .bind(bundle.sell_price)
        .bind(bundle.base_price)
        .bind(bundle.tax.as_ref().map(|t| t.id.as_str()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, item) in bundle.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO bundle_items (bundle_id, product_id, quantity, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&bundle.id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %bundle.id, items = bundle.items.len(), "Bundle stored");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
