//! Random catalog data for development.
//!
//! `catalog-chat seed` wipes the `products` table and refills it with
//! generated products in batches. Each batch is committed in its own
//! transaction and echoed to stdout; progress goes to stderr.

use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

use crate::catalog::{self, NewProduct};
use crate::progress::{SeedProgressEvent, SeedProgressReporter};

const PRODUCT_NAMES: [&str; 25] = [
    "Laptop",
    "Mouse",
    "Keyboard",
    "Monitor",
    "Headphones",
    "Webcam",
    "Microphone",
    "Tablet",
    "Smartphone",
    "Charger",
    "USB Cable",
    "HDMI Cable",
    "Router",
    "Printer",
    "Scanner",
    "External SSD",
    "RAM Module",
    "Graphics Card",
    "Motherboard",
    "CPU",
    "Power Supply",
    "Case",
    "Cooling Fan",
    "Thermal Paste",
    "Screwdriver Set",
];

const ADJECTIVES: [&str; 15] = [
    "Pro",
    "Ultra",
    "Premium",
    "Essential",
    "Basic",
    "Advanced",
    "Elite",
    "Standard",
    "Deluxe",
    "Compact",
    "Wireless",
    "Portable",
    "Gaming",
    "Professional",
    "Budget",
];

pub const CATEGORIES: [&str; 9] = [
    "Electronics",
    "Accessories",
    "Components",
    "Peripherals",
    "Networking",
    "Storage",
    "Audio",
    "Video",
    "Tools",
];

const DESCRIPTIONS: [&str; 10] = [
    "High-performance device with advanced features",
    "Reliable and durable for everyday use",
    "Premium quality with extended warranty",
    "Compact design perfect for portability",
    "Professional-grade equipment for serious users",
    "Budget-friendly option without compromising quality",
    "Latest technology with cutting-edge specs",
    "Ergonomic design for maximum comfort",
    "Energy-efficient and environmentally friendly",
    "Compatible with all major platforms",
];

const MODEL_SERIES: [&str; 4] = ["X", "Pro", "Plus", "Max"];

pub const MIN_PRICE: f64 = 9.99;
pub const MAX_PRICE: f64 = 1999.99;
pub const MAX_STOCK: i64 = 500;

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

/// One random product, e.g. "Gaming Graphics Card Max7".
pub fn random_product<R: Rng + ?Sized>(rng: &mut R) -> NewProduct {
    let mut name = format!("{} {}", pick(rng, &ADJECTIVES), pick(rng, &PRODUCT_NAMES));
    if rng.gen_bool(0.5) {
        name.push_str(&format!(" {}{}", pick(rng, &MODEL_SERIES), rng.gen_range(1..=9)));
    }

    let price = (rng.gen_range(MIN_PRICE..=MAX_PRICE) * 100.0).round() / 100.0;

    NewProduct {
        name,
        category: pick(rng, &CATEGORIES).to_string(),
        price,
        description: pick(rng, &DESCRIPTIONS).to_string(),
        stock: rng.gen_range(0..=MAX_STOCK),
    }
}

/// Replaces the catalog with `count` random products, inserted `batch_size`
/// at a time. Returns the number of products stored.
pub async fn seed_catalog(
    pool: &SqlitePool,
    count: u64,
    batch_size: u64,
    reporter: &dyn SeedProgressReporter,
) -> Result<u64> {
    if batch_size == 0 {
        bail!("batch size must be >= 1");
    }

    reporter.report(SeedProgressEvent::Clearing);
    let removed = catalog::clear_products(pool).await?;
    info!(removed, "cleared existing products");

    let batches = count.div_ceil(batch_size);
    let mut stored = 0u64;

    for batch in 0..batches {
        let start = batch * batch_size;
        let size = batch_size.min(count - start);

        let products: Vec<NewProduct> = {
            let mut rng = rand::thread_rng();
            (0..size).map(|_| random_product(&mut rng)).collect()
        };
        stored += catalog::insert_products(pool, &products).await?;

        println!("Batch {}/{} ({} products):", batch + 1, batches, size);
        for (i, p) in products.iter().enumerate() {
            println!(
                "  {}. {} - ${:.2} ({})",
                start + i as u64 + 1,
                p.name,
                p.price,
                p.category
            );
        }

        reporter.report(SeedProgressEvent::Inserted {
            batch: batch + 1,
            batches,
            n: stored,
            total: count,
        });
    }

    info!(stored, batches, "catalog seeded");
    Ok(stored)
}
