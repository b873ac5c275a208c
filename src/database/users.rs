//! User repository - PostgreSQL operations for users using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::auth::gate::User;
use crate::auth::role::{MembershipTier, Role};

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user if missing. Provisioning is idempotent: an existing
    /// row is left untouched.
    pub async fn upsert(&self, user: &User) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO users (email, display_name, avatar_url, role, membership, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.membership.to_string())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert user: {}", e))?;

        debug!(user = %user.email, "User persisted");
        Ok(())
    }

    pub async fn find(&self, email: &str) -> Result<Option<User>, String> {
        let row = sqlx::query(
            r#"
            SELECT email, display_name, avatar_url, role, membership, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to find user: {}", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.get("role");
        let membership: String = row.get("membership");

        Ok(Some(User {
            email: row.get("email"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
            role: role.parse::<Role>()?,
            membership: membership.parse::<MembershipTier>()?,
            created_at: row.get("created_at"),
        }))
    }

    pub async fn update_role(&self, email: &str, role: Role) -> Result<(), String> {
        sqlx::query("UPDATE users SET role = $2 WHERE email = $1")
            .bind(email)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to update role: {}", e))?;

        Ok(())
    }

    pub async fn update_membership(
        &self,
        email: &str,
        membership: MembershipTier,
    ) -> Result<(), String> {
        sqlx::query("UPDATE users SET membership = $2 WHERE email = $1")
            .bind(email)
            .bind(membership.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to update membership: {}", e))?;

        Ok(())
    }
}
