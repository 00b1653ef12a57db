//! Catalog context for chat augmentation.
//!
//! Turns a [`FilterSpec`] into a catalog query and the result into synthetic
//! system messages that are prepended to the conversation. The builder never
//! fails: a query error becomes a system message saying retrieval failed.
//!
//! # Predicate
//!
//! | FilterSpec field | SQL |
//! |------------------|-----|
//! | `categoryKeywords` | `(category LIKE kw OR name LIKE kw) OR ...` |
//! | `searchTerms` | `(name LIKE t OR description LIKE t) OR ...` |
//! | `minPrice` / `maxPrice` | `price >= ?` / `price <= ?` |
//!
//! Groups are combined with `AND`; matching is case-insensitive substring.
//! Rows are ordered by `price, id` when a price bound applies and by `id`
//! otherwise.

use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::catalog::{self, push_like, SELECT_ITEM};
use crate::config::AugmentConfig;
use crate::models::{CatalogItem, ChatMessage, FilterSpec};

/// A [`FilterSpec`] after sanitizing: blank keywords removed, unusable price
/// bounds dropped, limit clamped to `1..=max_limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFilter {
    pub category_keywords: Vec<String>,
    pub search_terms: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: i64,
}

impl CatalogFilter {
    pub fn from_spec(spec: &FilterSpec, default_limit: i64, max_limit: i64) -> Self {
        let clean = |values: &[String]| -> Vec<String> {
            values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        };
        let bound = |b: Option<f64>| b.filter(|p| p.is_finite() && *p >= 0.0);

        let limit = if spec.limit <= 0 {
            default_limit
        } else {
            spec.limit.min(max_limit)
        };

        Self {
            category_keywords: clean(&spec.category_keywords),
            search_terms: clean(&spec.search_terms),
            min_price: bound(spec.min_price),
            max_price: bound(spec.max_price),
            limit,
        }
    }

    pub fn has_price_bound(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    pub fn build_query(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(SELECT_ITEM);
        let mut has_where = false;

        if !self.category_keywords.is_empty() {
            push_conjunction(&mut qb, &mut has_where);
            push_any_match(&mut qb, &self.category_keywords, ["category", "name"]);
        }

        if !self.search_terms.is_empty() {
            push_conjunction(&mut qb, &mut has_where);
            push_any_match(&mut qb, &self.search_terms, ["name", "description"]);
        }

        if let Some(min) = self.min_price {
            push_conjunction(&mut qb, &mut has_where);
            qb.push("price >= ");
            qb.push_bind(min);
        }

        if let Some(max) = self.max_price {
            push_conjunction(&mut qb, &mut has_where);
            qb.push("price <= ");
            qb.push_bind(max);
        }

        if self.has_price_bound() {
            qb.push(" ORDER BY price ASC, id ASC");
        } else {
            qb.push(" ORDER BY id ASC");
        }

        qb.push(" LIMIT ");
        qb.push_bind(self.limit);
        qb
    }
}

fn push_conjunction(qb: &mut QueryBuilder<'static, Sqlite>, has_where: &mut bool) {
    qb.push(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

/// `(c1 LIKE v1 OR c2 LIKE v1 OR c1 LIKE v2 OR ...)`
fn push_any_match(qb: &mut QueryBuilder<'static, Sqlite>, values: &[String], columns: [&str; 2]) {
    qb.push("(");
    for (i, value) in values.iter().enumerate() {
        for (j, column) in columns.iter().enumerate() {
            if i > 0 || j > 0 {
                qb.push(" OR ");
            }
            push_like(qb, column, value);
        }
    }
    qb.push(")");
}

pub async fn query_filtered(pool: &SqlitePool, filter: &CatalogFilter) -> Result<Vec<CatalogItem>> {
    let mut qb = filter.build_query();
    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(catalog::item_from_row).collect())
}

pub struct ContextBuilder {
    pool: SqlitePool,
    default_limit: i64,
    max_limit: i64,
}

impl ContextBuilder {
    pub fn new(pool: SqlitePool, config: &AugmentConfig) -> Self {
        Self {
            pool,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }

    /// System messages describing the catalog rows that match `spec`.
    pub async fn build(&self, spec: &FilterSpec) -> Vec<ChatMessage> {
        let filter = CatalogFilter::from_spec(spec, self.default_limit, self.max_limit);

        match self.retrieve(&filter).await {
            Ok((items, total)) => {
                debug!(matched = items.len(), total, "catalog context built");
                vec![ChatMessage::system(format_matches(&items, total))]
            }
            Err(e) => {
                warn!(error = %e, "catalog retrieval failed");
                vec![ChatMessage::system(format_failure(&e.to_string()))]
            }
        }
    }

    async fn retrieve(&self, filter: &CatalogFilter) -> Result<(Vec<CatalogItem>, i64)> {
        let items = query_filtered(&self.pool, filter).await?;
        let total = catalog::count_products(&self.pool).await?;
        Ok((items, total))
    }
}

pub fn format_matches(items: &[CatalogItem], total: i64) -> String {
    if items.is_empty() {
        return "Product database: no products matched the user's request. \
                Say that nothing in the catalog matches instead of inventing products."
            .to_string();
    }

    let mut out = format!(
        "Product database: {} matching product(s) out of {} in the catalog. \
         Use only these products when answering.\n",
        items.len(),
        total
    );
    for item in items {
        out.push_str(&format!(
            "- {} | category: {} | price: ${:.2} | stock: {}\n",
            item.name, item.category, item.price, item.stock
        ));
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn format_failure(error: &str) -> String {
    format!(
        "Product database: retrieval failed ({}). Answer without catalog data.",
        error
    )
}
