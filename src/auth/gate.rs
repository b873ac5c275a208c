//! Authorization gate and user directory.
//!
//! The directory is the single store for user records. First successful
//! resolution of an unknown identity provisions a record with the default
//! role and no membership; re-provisioning is a no-op. Role changes go
//! through `set_role` (admin capability), membership changes only through
//! the verification workflow.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::identity::{IdentityProfile, IdentityProvider};
use crate::auth::role::{MembershipTier, Role};
use crate::database::DatabasePool;
use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identity key, unique. Trusted as authoritative from the provider.
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub membership: MembershipTier,
    pub created_at: DateTime<Utc>,
}

impl User {
    fn from_profile(profile: &IdentityProfile) -> Self {
        Self {
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            role: Role::default(),
            membership: MembershipTier::default(),
            created_at: Utc::now(),
        }
    }
}

/// Resolved caller identity attached to each authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_key: String,
    pub role: Role,
    pub membership: MembershipTier,
}

/// In-memory authoritative user store with optional Postgres write-through.
pub struct UserDirectory {
    users: DashMap<String, User>,
    db: Option<Arc<DatabasePool>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Get or create the record for an identity. Idempotent: an existing
    /// record is returned unchanged.
    pub async fn provision(&self, profile: &IdentityProfile) -> Result<User, CoreError> {
        if let Some(existing) = self.get(&profile.email).await {
            return Ok(existing);
        }

        let user = self
            .users
            .entry(profile.email.clone())
            .or_insert_with(|| {
                info!(user = %profile.email, "Provisioned new user");
                User::from_profile(profile)
            })
            .clone();

        if let Some(ref db) = self.db {
            db.users()
                .upsert(&user)
                .await
                .map_err(CoreError::Storage)?;
        }

        Ok(user)
    }

    pub async fn get(&self, email: &str) -> Option<User> {
        if let Some(user) = self.users.get(email) {
            return Some(user.clone());
        }

        // Fall back to Postgres and warm the map.
        if let Some(ref db) = self.db {
            match db.users().find(email).await {
                Ok(Some(user)) => {
                    self.users.insert(email.to_string(), user.clone());
                    return Some(user);
                }
                Ok(None) => {}
                Err(e) => warn!(user = %email, error = %e, "User lookup failed"),
            }
        }

        None
    }

    /// Change a user's role. Capability-gated at the API checkpoint.
    pub async fn set_role(&self, email: &str, role: Role) -> Result<User, CoreError> {
        let user = {
            let mut entry = self
                .users
                .get_mut(email)
                .ok_or_else(|| CoreError::UserNotFound(email.to_string()))?;
            entry.role = role;
            entry.clone()
        };

        if let Some(ref db) = self.db {
            db.users()
                .update_role(email, role)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(user = %email, role = %role, "Role updated");
        Ok(user)
    }

    /// Change a user's membership tier. Only the verification workflow
    /// calls this, on a confirmed payment.
    pub(crate) async fn set_membership(
        &self,
        email: &str,
        membership: MembershipTier,
    ) -> Result<User, CoreError> {
        let user = {
            let mut entry = self
                .users
                .get_mut(email)
                .ok_or_else(|| CoreError::UserNotFound(email.to_string()))?;
            entry.membership = membership;
            entry.clone()
        };

        if let Some(ref db) = self.db {
            db.users()
                .update_membership(email, membership)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(user = %email, membership = %membership, "Membership updated");
        Ok(user)
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves bearer credentials into auth contexts and checks role
/// requirements for privileged operations.
pub struct AuthorizationGate {
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<UserDirectory>,
}

impl AuthorizationGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, directory: Arc<UserDirectory>) -> Self {
        Self {
            provider,
            directory,
        }
    }

    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Resolve a bearer credential. `Ok(None)` means the provider did not
    /// recognize the token; the caller decides whether that is fatal.
    pub async fn resolve(&self, bearer: &str) -> Result<Option<AuthContext>, CoreError> {
        let profile = match self.provider.resolve(bearer).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return Ok(None),
            Err(e) => {
                // Provider outage reads as "no resolvable identity" to the
                // caller; the operational detail goes to the logs.
                warn!(error = %e, "Identity provider unavailable");
                return Ok(None);
            }
        };

        let user = self.directory.provision(&profile).await?;
        debug!(user = %user.email, role = %user.role, "Identity resolved");

        Ok(Some(AuthContext {
            user_key: user.email,
            role: user.role,
            membership: user.membership,
        }))
    }

    /// Check that the caller holds one of the accepted roles.
    ///
    /// `None` context means unauthenticated (401); a known identity with a
    /// role outside the accepted set is unauthorized (403).
    pub fn authorize<'a>(
        &self,
        ctx: Option<&'a AuthContext>,
        accepted: &[Role],
    ) -> Result<&'a AuthContext, CoreError> {
        let ctx = ctx.ok_or(CoreError::Unauthenticated)?;

        if accepted.contains(&ctx.role) {
            Ok(ctx)
        } else {
            let wanted = accepted
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(" or ");
            Err(CoreError::Unauthorized(format!("requires role {wanted}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::StaticIdentityProvider;

    fn gate_with(tokens: StaticIdentityProvider) -> AuthorizationGate {
        AuthorizationGate::new(Arc::new(tokens), Arc::new(UserDirectory::new()))
    }

    #[tokio::test]
    async fn test_first_resolution_provisions_default_user() {
        let gate = gate_with(
            StaticIdentityProvider::new().with_token("tok", "ada@example.com", "Ada"),
        );

        let ctx = gate.resolve("tok").await.unwrap().unwrap();
        assert_eq!(ctx.user_key, "ada@example.com");
        assert_eq!(ctx.role, Role::User);
        assert_eq!(ctx.membership, MembershipTier::None);
    }

    #[tokio::test]
    async fn test_reprovisioning_is_a_noop() {
        let gate = gate_with(
            StaticIdentityProvider::new().with_token("tok", "ada@example.com", "Ada"),
        );

        gate.resolve("tok").await.unwrap().unwrap();
        gate.directory()
            .set_role("ada@example.com", Role::Moderator)
            .await
            .unwrap();

        // Second resolution must not reset the promoted role.
        let ctx = gate.resolve("tok").await.unwrap().unwrap();
        assert_eq!(ctx.role, Role::Moderator);
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let gate = gate_with(StaticIdentityProvider::new());
        assert!(gate.resolve("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_authorize_splits_401_from_403() {
        let gate = gate_with(
            StaticIdentityProvider::new().with_token("tok", "ada@example.com", "Ada"),
        );
        let ctx = gate.resolve("tok").await.unwrap().unwrap();

        assert_eq!(
            gate.authorize(None, Role::MODERATION).unwrap_err(),
            CoreError::Unauthenticated
        );
        assert!(matches!(
            gate.authorize(Some(&ctx), Role::MODERATION).unwrap_err(),
            CoreError::Unauthorized(_)
        ));
        assert!(gate.authorize(Some(&ctx), &[Role::User]).is_ok());
    }

    #[tokio::test]
    async fn test_no_role_hierarchy() {
        let directory = Arc::new(UserDirectory::new());
        let gate = AuthorizationGate::new(
            Arc::new(StaticIdentityProvider::new().with_token(
                "tok",
                "root@example.com",
                "Root",
            )),
            directory.clone(),
        );

        gate.resolve("tok").await.unwrap();
        directory
            .set_role("root@example.com", Role::Admin)
            .await
            .unwrap();
        let ctx = gate.resolve("tok").await.unwrap().unwrap();

        // Admin is not implicitly a moderator-only operation's role unless
        // the operation lists it.
        assert!(gate.authorize(Some(&ctx), &[Role::Moderator]).is_err());
        assert!(gate.authorize(Some(&ctx), Role::MODERATION).is_ok());
    }
}
