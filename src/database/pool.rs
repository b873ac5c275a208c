//! Database connection pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::coupons::CouponRepository;
use crate::database::payments::PaymentRepository;
use crate::database::products::ProductRepository;
use crate::database::users::UserRepository;

pub struct DatabasePool {
    pool: PgPool,
    users: UserRepository,
    products: ProductRepository,
    coupons: CouponRepository,
    payments: PaymentRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        let users = UserRepository::new(pool.clone());
        let products = ProductRepository::new(pool.clone());
        let coupons = CouponRepository::new(pool.clone());
        let payments = PaymentRepository::new(pool.clone());

        Ok(Self {
            pool,
            users,
            products,
            coupons,
            payments,
        })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                email        TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                avatar_url   TEXT,
                role         TEXT NOT NULL DEFAULT 'user',
                membership   TEXT NOT NULL DEFAULT 'none',
                created_at   TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create users table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id          UUID PRIMARY KEY,
                owner       TEXT NOT NULL,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                tags        TEXT[] NOT NULL DEFAULT '{}',
                image_url   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                is_featured BOOLEAN NOT NULL DEFAULT FALSE,
                created_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create products table: {}", e))?;

        // Engagement is a join table keyed (product_id, user_key, kind):
        // the membership test-and-flip is one indexed statement and counts
        // are set cardinalities.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS product_engagement (
                product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                user_key   TEXT NOT NULL,
                kind       TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (product_id, user_key, kind)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create product_engagement table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coupons (
                code          TEXT PRIMARY KEY,
                discount_type TEXT NOT NULL,
                amount        BIGINT NOT NULL,
                expires_at    TIMESTAMPTZ NOT NULL,
                active        BOOLEAN NOT NULL DEFAULT TRUE,
                created_at    TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create coupons table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id             UUID PRIMARY KEY,
                user_key       TEXT NOT NULL,
                amount         BIGINT NOT NULL,
                currency       TEXT NOT NULL,
                coupon_code    TEXT,
                charge_ref     TEXT NOT NULL,
                client_secret  TEXT,
                redirect_url   TEXT,
                status         TEXT NOT NULL DEFAULT 'pending',
                failure_reason TEXT,
                created_at     TIMESTAMPTZ NOT NULL,
                confirmed_at   TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create payments table: {}", e))?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn products(&self) -> &ProductRepository {
        &self.products
    }

    pub fn coupons(&self) -> &CouponRepository {
        &self.coupons
    }

    pub fn payments(&self) -> &PaymentRepository {
        &self.payments
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
