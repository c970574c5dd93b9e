//! # Seed Data Generator
//!
//! Populates the database with a small café catalog and rings up one
//! sample transaction.
//!
//! ## Usage
//! ```bash
//! # Database from TALLY_DATABASE_PATH (default ./tally.db)
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//!
//! # Verbose logging
//! RUST_LOG=debug cargo run -p tally-db --bin seed
//! ```
//!
//! ## Generated Catalog
//! - Drinks with size variants (Latte, Cappuccino) under a happy-hour discount
//! - Plain items (Croissant, Muffin, Water)
//! - A "latte + croissant" co-purchase promo and a "3 or more" promo
//! - A breakfast bundle with 10% tax

use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tally_core::{
    Adjustment, Bundle, BundleItem, Discount, LineSpec, Money, Product, ProductVariant, Promo,
    Rate, Tax,
};
use tally_db::{AppConfig, Database};

/// (id, name, [(size, sell_price_cents)])
const DRINKS: &[(&str, &str, &[(&str, i64)])] = &[
    ("latte", "Latte", &[("S", 400), ("M", 475), ("L", 550)]),
    ("cappuccino", "Cappuccino", &[("S", 380), ("M", 450)]),
];

/// (id, name, sell_price_cents)
const FOOD: &[(&str, &str, i64)] = &[
    ("croissant", "Croissant", 325),
    ("muffin", "Blueberry Muffin", 300),
    ("water", "Still Water", 150),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $TALLY_DATABASE_PATH or ./tally.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing(&config.log_filter);

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database_path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        db.close().await;
        return Ok(());
    }

    for product in demo_products() {
        db.catalog().insert_product(&product).await?;
        println!("  + {} ({})", product.name, product.sku);
    }
    db.catalog().insert_bundle(&demo_bundle()).await?;
    println!("  + Breakfast bundle");

    println!();
    println!("Listings:");
    let now = Utc::now();
    for (id, _, _) in DRINKS {
        if let Some(listing) = db.catalog().listing(id, now).await? {
            for v in &listing.variants {
                println!(
                    "  {} {:<2} {} → {}",
                    listing.name, v.name, v.sell_price, v.final_price
                );
            }
        }
    }

    println!();
    println!("Ringing up a sample transaction...");
    let checkout = db.checkout();
    let txn = checkout
        .create_transaction(&[
            LineSpec::product("latte", 1)
                .with_variant("latte-l")
                .with_attribute("milk", "oat"),
            LineSpec::product("croissant", 1),
            LineSpec::product("water", 3),
            LineSpec::bundle("breakfast", 1),
        ])
        .await?;

    for item in &txn.items {
        let label = item
            .product_id
            .as_deref()
            .or(item.bundle_id.as_deref())
            .unwrap_or("?");
        println!(
            "  {:<10} x{}  price {}  discount {}  promo {}  tax {}",
            label, item.quantity, item.price, item.discount, item.promo, item.tax
        );
    }
    println!(
        "  total {}  discount {}  promo {}  tax {}",
        txn.total, txn.total_discount, txn.total_promo, txn.total_tax
    );

    let txn = checkout.complete(&txn.id, txn.grand_total()).await?;
    println!("✓ Transaction {} {} for {}", txn.id, txn.status, txn.grand_total());

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Initializes tracing; `RUST_LOG` overrides the configured filter.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn demo_products() -> Vec<Product> {
    let now = Utc::now();
    let happy_hour = Discount {
        id: "happy-hour".to_string(),
        name: "Happy hour".to_string(),
        value: Adjustment::Percentage(Rate::from_percent(10)),
        is_active: true,
        start_at: Some(now - Duration::hours(1)),
        end_at: Some(now + Duration::hours(2)),
    };

    let with_croissant = Promo {
        id: "latte-croissant".to_string(),
        name: "Latte + croissant".to_string(),
        value: Adjustment::Fixed(Money::from_cents(50)),
        is_active: true,
        min_quantity: 1,
        required_product_ids: ["croissant".to_string()].into_iter().collect(),
    };

    let three_or_more = Promo {
        id: "three-or-more".to_string(),
        name: "3 or more".to_string(),
        value: Adjustment::Percentage(Rate::from_percent(5)),
        is_active: true,
        min_quantity: 3,
        required_product_ids: BTreeSet::new(),
    };

    let mut products: Vec<Product> = DRINKS
        .iter()
        .map(|(id, name, sizes)| Product {
            id: id.to_string(),
            sku: id.to_uppercase(),
            name: name.to_string(),
            has_variant: true,
            base_price: None,
            sell_price: None,
            discount: Some(happy_hour.clone()),
            promos: vec![with_croissant.clone(), three_or_more.clone()],
            variants: sizes
                .iter()
                .map(|(size, cents)| ProductVariant {
                    id: format!("{}-{}", id, size.to_lowercase()),
                    product_id: id.to_string(),
                    name: size.to_string(),
                    base_price: Some(Money::from_cents(cents * 40 / 100)),
                    sell_price: Money::from_cents(*cents),
                })
                .collect(),
        })
        .collect();

    products.extend(FOOD.iter().map(|(id, name, cents)| Product {
        id: id.to_string(),
        sku: id.to_uppercase(),
        name: name.to_string(),
        has_variant: false,
        base_price: Some(Money::from_cents(cents / 2)),
        sell_price: Some(Money::from_cents(*cents)),
        discount: None,
        promos: if *id == "water" {
            vec![three_or_more.clone()]
        } else {
            vec![]
        },
        variants: vec![],
    }));

    products
}

fn demo_bundle() -> Bundle {
    Bundle {
        id: "breakfast".to_string(),
        name: "Breakfast".to_string(),
        sell_price: Money::from_cents(650),
        base_price: Some(Money::from_cents(300)),
        tax: Some(Tax {
            id: "vat-10".to_string(),
            name: "VAT 10%".to_string(),
            value: Adjustment::Percentage(Rate::from_percent(10)),
        }),
        items: vec![
            BundleItem {
                product_id: "cappuccino".to_string(),
                quantity: 1,
            },
            BundleItem {
                product_id: "croissant".to_string(),
                quantity: 1,
            },
        ],
    }
}
