//! Product repository - PostgreSQL operations for products and their
//! engagement join table using sqlx

use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::directory::engagement::EngagementKind;
use crate::directory::product::{Product, ProductStatus};

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, product: &Product) -> Result<(), String> {
        let tags: Vec<String> = product.tags.iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO products
            (id, owner, name, description, tags, image_url, status, is_featured, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                tags = EXCLUDED.tags,
                image_url = EXCLUDED.image_url,
                status = EXCLUDED.status,
                is_featured = EXCLUDED.is_featured,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.owner)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&tags)
        .bind(&product.image_url)
        .bind(product.status.as_str())
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert product: {}", e))?;

        debug!(product_id = %product.id, "Product persisted");
        Ok(())
    }

    /// Flip one user's engagement row. The composite primary key makes the
    /// insert side a no-op on replay.
    pub async fn set_engagement(
        &self,
        product_id: Uuid,
        user_key: &str,
        kind: EngagementKind,
        active: bool,
    ) -> Result<(), String> {
        if active {
            sqlx::query(
                r#"
                INSERT INTO product_engagement (product_id, user_key, kind)
                VALUES ($1, $2, $3)
                ON CONFLICT (product_id, user_key, kind) DO NOTHING
                "#,
            )
            .bind(product_id)
            .bind(user_key)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to record engagement: {}", e))?;
        } else {
            sqlx::query(
                r#"
                DELETE FROM product_engagement
                WHERE product_id = $1 AND user_key = $2 AND kind = $3
                "#,
            )
            .bind(product_id)
            .bind(user_key)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to clear engagement: {}", e))?;
        }

        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<Product>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, name, description, tags, image_url,
                   status, is_featured, created_at, updated_at
            FROM products
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load products: {}", e))?;

        let mut products: HashMap<Uuid, Product> = HashMap::new();
        for row in rows {
            let status: String = row.get("status");
            let tags: Vec<String> = row.get("tags");
            let product = Product {
                id: row.get("id"),
                owner: row.get("owner"),
                name: row.get("name"),
                description: row.get("description"),
                tags: tags.into_iter().collect(),
                image_url: row.get("image_url"),
                status: status.parse::<ProductStatus>()?,
                is_featured: row.get("is_featured"),
                upvoted_by: HashSet::new(),
                reported_by: HashSet::new(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            };
            products.insert(product.id, product);
        }

        let engagement_rows =
            sqlx::query("SELECT product_id, user_key, kind FROM product_engagement")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| format!("Failed to load engagement: {}", e))?;

        for row in engagement_rows {
            let product_id: Uuid = row.get("product_id");
            let user_key: String = row.get("user_key");
            let kind: String = row.get("kind");

            if let Some(product) = products.get_mut(&product_id) {
                match kind.as_str() {
                    "upvote" => {
                        product.upvoted_by.insert(user_key);
                    }
                    "report" => {
                        product.reported_by.insert(user_key);
                    }
                    other => return Err(format!("Unknown engagement kind: {}", other)),
                }
            }
        }

        Ok(products.into_values().collect())
    }

    pub async fn delete(&self, product_id: Uuid) -> Result<(), String> {
        // Engagement rows cascade with the product.
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to delete product: {}", e))?;

        debug!(product_id = %product_id, "Product deleted from store");
        Ok(())
    }
}
