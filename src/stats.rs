//! Catalog statistics.
//!
//! A quick summary of what the catalog holds: product count, average price
//! and a per-category breakdown. Printed by `catalog-chat stats` and at the
//! end of `catalog-chat seed`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogStats {
    pub total: i64,
    /// `0.0` for an empty catalog.
    pub average_price: f64,
    /// Largest categories first, ties by name.
    pub categories: Vec<CategoryCount>,
}

pub async fn catalog_stats(pool: &SqlitePool) -> Result<CatalogStats> {
    let row = sqlx::query("SELECT COUNT(*) AS total, AVG(price) AS average_price FROM products")
        .fetch_one(pool)
        .await?;
    let total: i64 = row.get("total");
    let average_price: Option<f64> = row.get("average_price");

    let rows = sqlx::query(
        r#"
        SELECT category, COUNT(*) AS count
        FROM products
        GROUP BY category
        ORDER BY count DESC, category ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let categories = rows
        .iter()
        .map(|r| CategoryCount {
            category: r.get("category"),
            count: r.get("count"),
        })
        .collect();

    Ok(CatalogStats {
        total,
        average_price: average_price.unwrap_or(0.0),
        categories,
    })
}

pub fn print_stats(stats: &CatalogStats) {
    println!("Catalog Stats");
    println!("=============");
    println!();
    println!("  Products:       {}", stats.total);
    println!("  Categories:     {}", stats.categories.len());
    println!("  Average price:  ${:.2}", stats.average_price);

    if !stats.categories.is_empty() {
        println!();
        println!("  {:<16} {:>8}", "CATEGORY", "PRODUCTS");
        println!("  {}", "-".repeat(25));
        for c in &stats.categories {
            println!("  {:<16} {:>8}", c.category, c.count);
        }
    }
    println!();
}
