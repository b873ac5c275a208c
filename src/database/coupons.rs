//! Coupon repository - PostgreSQL operations for coupons using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::billing::coupon::{Coupon, DiscountType};

pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, coupon: &Coupon) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO coupons (code, discount_type, amount, expires_at, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code) DO UPDATE SET
                discount_type = EXCLUDED.discount_type,
                amount = EXCLUDED.amount,
                expires_at = EXCLUDED.expires_at,
                active = EXCLUDED.active
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.amount)
        .bind(coupon.expires_at)
        .bind(coupon.active)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert coupon: {}", e))?;

        debug!(code = %coupon.code, "Coupon persisted");
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<Coupon>, String> {
        let rows = sqlx::query(
            r#"
            SELECT code, discount_type, amount, expires_at, active, created_at
            FROM coupons
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load coupons: {}", e))?;

        let mut coupons = Vec::with_capacity(rows.len());
        for row in rows {
            let discount_type: String = row.get("discount_type");
            coupons.push(Coupon {
                code: row.get("code"),
                discount_type: match discount_type.as_str() {
                    "flat" => DiscountType::Flat,
                    "percent" => DiscountType::Percent,
                    other => return Err(format!("Unknown discount type: {}", other)),
                },
                amount: row.get("amount"),
                expires_at: row.get("expires_at"),
                active: row.get("active"),
                created_at: row.get("created_at"),
            });
        }

        Ok(coupons)
    }

    pub async fn delete(&self, code: &str) -> Result<(), String> {
        sqlx::query("DELETE FROM coupons WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to delete coupon: {}", e))?;

        Ok(())
    }
}
