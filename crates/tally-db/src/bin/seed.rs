//! # Seed Data Generator
//!
//! Populates a development database with customers, serial-numbered stock
//! and a spread of sales in every status.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Customers with phone numbers
//! - Phones, tablets and laptops, each with a unique serial number
//! - Sales over the last 30 days: unpaid, part paid, paid and returned

use chrono::{Duration, Utc};
use std::env;
use tally_core::customer::NewCustomer;
use tally_core::sale::{NewPayment, NewSale, NewSaleItem};
use tally_db::{Database, DbConfig, NewProduct};

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ana Torres", "555-0101"),
    ("Bruno Silva", "555-0102"),
    ("Carla Mendes", "555-0103"),
    ("Diego Rocha", "555-0104"),
    ("Elena Costa", "555-0105"),
];

/// (sku prefix, name, price in cents)
const MODELS: &[(&str, &str, i64)] = &[
    ("PHN", "Galaxy A54", 32900),
    ("PHN", "iPhone 13", 59900),
    ("TAB", "iPad 10th Gen", 44900),
    ("LAP", "ThinkPad E14", 89900),
    ("ACC", "AirPods Pro", 24900),
];

const UNITS_PER_MODEL: usize = 6;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.health().await?;
    if existing.customers > 0 || existing.sales > 0 {
        println!(
            "⚠ Database already has {} customers and {} sales",
            existing.customers, existing.sales
        );
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Stock
    println!();
    println!("Stocking products...");
    let mut stock = Vec::new();
    for (model_idx, (prefix, name, price_cents)) in MODELS.iter().enumerate() {
        for unit in 0..UNITS_PER_MODEL {
            let serial = format!("SN-{}{:02}-{:04}", prefix, model_idx, unit * 37 + 1000);
            let product = db
                .products()
                .insert(NewProduct {
                    sku: format!("{}-{:02}-{:02}", prefix, model_idx, unit),
                    serial_number: Some(serial),
                    name: name.to_string(),
                    description: None,
                    price_cents: *price_cents,
                    stock: 1,
                })
                .await?;
            stock.push(product);
        }
    }
    println!("✓ Stocked {} serial-numbered units", stock.len());

    // Customers
    let mut customers = Vec::new();
    for (name, phone) in CUSTOMERS {
        let found = db
            .customers()
            .search_or_create(NewCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                ..Default::default()
            })
            .await?;
        customers.push(found.customer);
    }
    println!("✓ Created {} customers", customers.len());

    // Sales: one unit each, cycling through customers and outcomes
    println!();
    println!("Ringing up sales...");
    let now = Utc::now();
    let sales = db.sales();
    let mut created = 0;

    for (idx, product) in stock.iter().enumerate().step_by(2) {
        let customer = &customers[idx % customers.len()];
        let serial = product.serial_number.clone().unwrap_or_default();

        let sale = sales
            .create(NewSale {
                customer_id: customer.id.clone(),
                customer_name: customer.name.clone(),
                items: vec![NewSaleItem {
                    product_id: Some(product.id.clone()),
                    serial_number: serial.clone(),
                    product_name: product.name.clone(),
                    quantity: 1,
                    price_cents: product.price_cents,
                }],
                sale_date: Some(now - Duration::days((idx % 30) as i64)),
                created_by: "seed".to_string(),
                ..Default::default()
            })
            .await?;

        match idx % 8 {
            // Part paid
            2 => {
                sales
                    .add_payment(&sale.id, NewPayment::new(product.price_cents / 2))
                    .await?;
            }
            // Paid in full
            4 => {
                sales
                    .add_payment(&sale.id, NewPayment::new(product.price_cents))
                    .await?;
            }
            // Paid, then returned
            6 => {
                sales
                    .add_payment(&sale.id, NewPayment::new(product.price_cents))
                    .await?;
                sales
                    .return_item(&sale.id, &serial, Some("Changed mind"))
                    .await?;
            }
            _ => {}
        }

        created += 1;
    }
    println!("✓ Created {} sales", created);

    // Verify
    println!();
    println!("Verifying serial lookup...");
    let lookup = db.products().search_by_serial("SN-PHN").await?;
    println!("  Search 'SN-PHN': found = {}", lookup.found);

    let health = db.health().await?;
    println!(
        "  {} customers, {} sales, {} products",
        health.customers, health.sales, health.products
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
