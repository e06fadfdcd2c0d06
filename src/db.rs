// =============================================================================
// DATABASE MODULE
// =============================================================================
// This module handles all PostgreSQL database operations: the product
// catalog and the persisted pricing settings record.
//
// LEARNING NOTES:
// - SQLx provides async SQL with typed row mapping
// - Connection pooling improves performance
// - The settings record is stored as JSON text under its configuration name
// =============================================================================

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::models::{AdjustStockRequest, Product, UpsertProductRequest};

// -----------------------------------------------------------------------------
// DATABASE WRAPPER
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct Database {
    /// SQLx PostgreSQL connection pool
    pool: PgPool,
}

/// Row offset for a 1-indexed page. Computed in i64 so no page/per_page
/// combination can overflow.
pub fn page_offset(page: i32, per_page: i32) -> i64 {
    let page = i64::from(page.max(1));
    let per_page = i64::from(per_page.max(0));
    (page - 1).saturating_mul(per_page)
}

const PRODUCT_COLUMNS: &str = "id, sku, name, product_type, manage_stock, stock_quantity, \
                               regular_price, price, created_at, updated_at";

impl Database {
    // -------------------------------------------------------------------------
    // CONNECTION
    // -------------------------------------------------------------------------
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // MIGRATIONS
    // -------------------------------------------------------------------------
    /// Create the catalog and settings tables if they don't exist and seed
    /// sample products.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                sku VARCHAR(50) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL,

                -- simple / variable / grouped / external
                product_type VARCHAR(20) NOT NULL DEFAULT 'simple',

                -- NULL quantity means stock is not tracked
                manage_stock BOOLEAN NOT NULL DEFAULT FALSE,
                stock_quantity INTEGER,

                -- regular_price is the stable adjustment base and is
                -- never written with an adjusted value
                regular_price DOUBLE PRECISION,
                price DOUBLE PRECISION,

                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT non_negative_prices
                    CHECK (COALESCE(regular_price, 0) >= 0 AND COALESCE(price, 0) >= 0)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create products table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pricing_settings (
                name VARCHAR(100) PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pricing_settings table")?;

        self.seed_sample_data().await?;

        Ok(())
    }

    /// Seed sample products covering every tier, plus a few ineligible ones
    async fn seed_sample_data(&self) -> Result<()> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        if count.0 > 0 {
            return Ok(());
        }

        // (sku, name, type, manage_stock, quantity, regular_price)
        let sample_items: Vec<(&str, &str, &str, bool, Option<i32>, f64)> = vec![
            ("SKU-LAMP-001", "Brass Desk Lamp", "simple", true, Some(3), 49.90),
            ("SKU-MUG-001", "Stoneware Mug", "simple", true, Some(14), 12.50),
            ("SKU-CHAIR-001", "Oak Dining Chair", "simple", true, Some(60), 129.00),
            ("SKU-CABLE-001", "USB-C Cable 2m", "simple", true, Some(500), 9.99),
            ("SKU-POSTER-001", "Print-on-demand Poster", "simple", false, None, 19.00),
            ("SKU-SHIRT-001", "Linen Shirt (sizes)", "variable", true, Some(2), 59.00),
            ("SKU-GIFT-001", "Gift Set", "grouped", false, None, 89.00),
        ];

        for (sku, name, product_type, manage_stock, quantity, regular_price) in sample_items {
            sqlx::query(
                r#"
                INSERT INTO products
                    (sku, name, product_type, manage_stock, stock_quantity, regular_price, price)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (sku) DO NOTHING
                "#,
            )
            .bind(sku)
            .bind(name)
            .bind(product_type)
            .bind(manage_stock)
            .bind(quantity)
            .bind(regular_price)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // CATALOG READS
    // -------------------------------------------------------------------------

    /// Get all products with pagination
    ///
    /// # Returns
    /// Tuple of (items, total_count)
    pub async fn list_products(&self, page: i32, per_page: i32) -> Result<(Vec<Product>, i64)> {
        let offset = page_offset(page, per_page);

        let items = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY sku ASC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch products")?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count products")?;

        Ok((items, total.0))
    }

    /// Get a single product by SKU
    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch product")?;

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // CATALOG WRITES
    // -------------------------------------------------------------------------

    /// Create or replace a product, keyed by SKU
    pub async fn upsert_product(&self, req: &UpsertProductRequest) -> Result<Product> {
        let price = req.price.or(req.regular_price);

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products
                (sku, name, product_type, manage_stock, stock_quantity, regular_price, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (sku) DO UPDATE SET
                name = EXCLUDED.name,
                product_type = EXCLUDED.product_type,
                manage_stock = EXCLUDED.manage_stock,
                stock_quantity = EXCLUDED.stock_quantity,
                regular_price = EXCLUDED.regular_price,
                price = EXCLUDED.price,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&req.sku)
        .bind(&req.name)
        .bind(req.product_type.as_str())
        .bind(req.manage_stock)
        .bind(req.stock_quantity)
        .bind(req.regular_price)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert product")?;

        Ok(product)
    }

    /// Adjust stock quantity, floored at zero. Only products that track
    /// stock can be adjusted.
    pub async fn adjust_stock(&self, sku: &str, req: &AdjustStockRequest) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET stock_quantity = GREATEST(COALESCE(stock_quantity, 0) + $1, 0),
                updated_at = NOW()
            WHERE sku = $2 AND manage_stock
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(req.delta)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to adjust stock")?;

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // SETTINGS RECORD
    // -------------------------------------------------------------------------

    /// Load the raw settings record. `None` when it was never saved.
    pub async fn load_settings(&self, name: &str) -> Result<Option<Map<String, Value>>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM pricing_settings WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load pricing settings")?;

        let Some((value,)) = row else {
            return Ok(None);
        };

        let record: Map<String, Value> = serde_json::from_str(&value)
            .with_context(|| format!("Settings record '{name}' is not a JSON object"))?;

        Ok(Some(record))
    }

    /// Persist the settings record, replacing any previous one
    pub async fn save_settings(&self, name: &str, record: &Map<String, Value>) -> Result<()> {
        let value = serde_json::to_string(record).context("Failed to encode settings")?;

        sqlx::query(
            r#"
            INSERT INTO pricing_settings (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to save pricing settings")?;

        Ok(())
    }

    /// Remove the settings record. Returns whether one existed.
    pub async fn delete_settings(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pricing_settings WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete pricing settings")?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // HEALTH CHECK
    // -------------------------------------------------------------------------

    /// Check if database connection is healthy
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn test_page_offset_does_not_overflow_on_huge_pages() {
        let offset = page_offset(i32::MAX, 100);
        assert_eq!(offset, (i32::MAX as i64 - 1) * 100);
        assert!(offset > 0);
    }
}
