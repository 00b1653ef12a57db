//! Product catalog store.
//!
//! All reads and writes of the `products` table go through this module:
//! tokenized keyword search, partial updates, sampling and counting. The
//! filter-driven query used for chat augmentation lives in
//! [`crate::context`], which reuses the row mapping and `LIKE` helpers here.
//!
//! # Tokenized search
//!
//! A free-text query is lowercased and split on runs of non-alphanumeric
//! characters. T-shirt spellings (`tshirt`, `tshirts`, `tee`, `t`) expand to
//! `tshirt`, `t-shirt` and `tee`. Each resulting token is matched as a
//! case-insensitive substring of name, category or description, and a row
//! matches if any token matches any column.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::CatalogItem;

/// Upper bound for a single listing or search page.
pub const MAX_PAGE_LIMIT: i64 = 500;

pub(crate) const SELECT_ITEM: &str =
    "SELECT id, name, category, price, description, stock FROM products";

const TSHIRT_SPELLINGS: [&str; 4] = ["tshirt", "tee", "t", "tshirts"];
const TSHIRT_EXPANSION: [&str; 3] = ["tshirt", "t-shirt", "tee"];

pub(crate) fn item_from_row(row: &SqliteRow) -> CatalogItem {
    CatalogItem {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        price: row.get("price"),
        description: row.get("description"),
        stock: row.get("stock"),
    }
}

/// `%term%` with `LIKE` wildcards escaped by `\`, lowercased for use against
/// `LOWER(column)`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Pushes `LOWER(column) LIKE ? ESCAPE '\'` for `term`.
pub(crate) fn push_like(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, term: &str) {
    qb.push(format!("LOWER({}) LIKE ", column));
    qb.push_bind(like_pattern(term));
    qb.push(" ESCAPE '\\'");
}

/// Splits a query into lowercase alphanumeric tokens.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies the synonym expansion and returns the sorted, de-duplicated set.
pub fn expand_tokens(tokens: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    for token in tokens {
        if TSHIRT_SPELLINGS.contains(&token.as_str()) {
            expanded.extend(TSHIRT_EXPANSION.iter().map(|s| s.to_string()));
        } else {
            expanded.push(token.clone());
        }
    }
    expanded.sort();
    expanded.dedup();
    expanded
}

/// Tokenized substring search across name, category and description.
///
/// An empty query (or one with no alphanumeric tokens) lists the catalog.
/// Results are ordered by id so repeated searches return the same page.
pub async fn search_products(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<CatalogItem>> {
    let expanded = expand_tokens(&tokenize(query));
    search_expanded(pool, &expanded, limit).await
}

async fn search_expanded(
    pool: &SqlitePool,
    expanded: &[String],
    limit: i64,
) -> Result<Vec<CatalogItem>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_ITEM);

    if !expanded.is_empty() {
        qb.push(" WHERE ");
        let mut first = true;
        for token in expanded {
            for column in ["name", "category", "description"] {
                if !first {
                    qb.push(" OR ");
                }
                first = false;
                push_like(&mut qb, column, token);
            }
        }
    }

    qb.push(" ORDER BY id ASC LIMIT ");
    qb.push_bind(limit.clamp(0, MAX_PAGE_LIMIT));

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(item_from_row).collect())
}

/// How a query was tokenized and what it matched.
#[derive(Debug, Clone, Serialize)]
pub struct SearchTrace {
    pub tokens: Vec<String>,
    pub expanded: Vec<String>,
    pub match_count: usize,
    pub items: Vec<CatalogItem>,
}

pub async fn trace_search(pool: &SqlitePool, query: &str, limit: i64) -> Result<SearchTrace> {
    let tokens = tokenize(query);
    let expanded = expand_tokens(&tokens);
    let items = search_expanded(pool, &expanded, limit).await?;
    Ok(SearchTrace {
        tokens,
        expanded,
        match_count: items.len(),
        items,
    })
}

/// First `limit` products by id.
pub async fn sample_products(pool: &SqlitePool, limit: i64) -> Result<Vec<CatalogItem>> {
    let rows = sqlx::query(&format!("{} ORDER BY id ASC LIMIT ?", SELECT_ITEM))
        .bind(limit.clamp(0, MAX_PAGE_LIMIT))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(item_from_row).collect())
}

pub async fn count_products(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Option<CatalogItem>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ITEM))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(item_from_row))
}

/// A partial update. Only these fields can be changed; absent fields keep
/// their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub stock: Option<i64>,
}

impl ProductUpdate {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(format!("price must be a non-negative number, got {}", price));
            }
        }
        if let Some(stock) = self.stock {
            if stock < 0 {
                return Err(format!("stock must be non-negative, got {}", stock));
            }
        }
        Ok(())
    }
}

/// Applies `update` to product `id`. Returns `None` when no such product exists.
pub async fn update_product(
    pool: &SqlitePool,
    id: i64,
    update: &ProductUpdate,
) -> Result<Option<CatalogItem>> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = COALESCE(?, name),
            category = COALESCE(?, category),
            price = COALESCE(?, price),
            description = COALESCE(?, description),
            stock = COALESCE(?, stock)
        WHERE id = ?
        "#,
    )
    .bind(update.name.as_deref())
    .bind(update.category.as_deref())
    .bind(update.price)
    .bind(update.description.as_deref())
    .bind(update.stock)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_product(pool, id).await
}

/// A product that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub stock: i64,
}

/// Inserts `products` in one transaction and returns how many were stored.
pub async fn insert_products(pool: &SqlitePool, products: &[NewProduct]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for p in products {
        let result = sqlx::query(
            "INSERT INTO products (name, category, price, description, stock) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&p.name)
        .bind(&p.category)
        .bind(p.price)
        .bind(&p.description)
        .bind(p.stock)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

/// Deletes every product and returns how many were removed.
pub async fn clear_products(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM products").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Round-trips a trivial query to prove the database is reachable.
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
