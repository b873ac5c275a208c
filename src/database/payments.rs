//! Payment repository - PostgreSQL operations for payments using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::billing::payment::{Payment, PaymentStatus};

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, payment: &Payment) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO payments
            (id, user_key, amount, currency, coupon_code, charge_ref,
             client_secret, redirect_url, status, failure_reason, created_at, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                failure_reason = EXCLUDED.failure_reason,
                confirmed_at = EXCLUDED.confirmed_at
            "#,
        )
        .bind(payment.id)
        .bind(&payment.user_key)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.coupon_code)
        .bind(&payment.charge_ref)
        .bind(&payment.client_secret)
        .bind(&payment.redirect_url)
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(payment.created_at)
        .bind(payment.confirmed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert payment: {}", e))?;

        debug!(payment_id = %payment.id, status = %payment.status, "Payment persisted");
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<Payment>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_key, amount, currency, coupon_code, charge_ref,
                   client_secret, redirect_url, status, failure_reason, created_at, confirmed_at
            FROM payments
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load payments: {}", e))?;

        let mut payments = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            payments.push(Payment {
                id: row.get("id"),
                user_key: row.get("user_key"),
                amount: row.get("amount"),
                currency: row.get("currency"),
                coupon_code: row.get("coupon_code"),
                charge_ref: row.get("charge_ref"),
                client_secret: row.get("client_secret"),
                redirect_url: row.get("redirect_url"),
                status: status.parse::<PaymentStatus>()?,
                failure_reason: row.get("failure_reason"),
                created_at: row.get("created_at"),
                confirmed_at: row.get("confirmed_at"),
            });
        }

        Ok(payments)
    }
}
