//! Product catalog: the store behind the engagement ledger and the
//! moderation state machine.
//!
//! Products live in a concurrent map keyed by id. Every mutation runs
//! inside the product's exclusive map entry, so per-product operations are
//! serialized and the set/count invariant cannot race. Cross-product
//! operations carry no ordering requirement.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{AuthContext, Role};
use crate::database::DatabasePool;
use crate::directory::engagement::{self, EngagementKind, ToggleOutcome};
use crate::directory::product::{Product, ProductDraft, ProductStatus};
use crate::error::CoreError;

pub struct ProductCatalog {
    products: DashMap<Uuid, Product>,
    report_threshold: usize,
    db: Option<Arc<DatabasePool>>,
}

impl ProductCatalog {
    pub fn new(report_threshold: usize) -> Self {
        Self {
            products: DashMap::new(),
            report_threshold,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn report_threshold(&self) -> usize {
        self.report_threshold
    }

    /// Load all persisted products into the map. Called once at startup
    /// when Postgres is enabled.
    pub async fn hydrate(&self) -> Result<usize, CoreError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let products = db.products().load_all().await.map_err(CoreError::Storage)?;
        let count = products.len();
        for product in products {
            self.products.insert(product.id, product);
        }

        info!(count, "Product catalog hydrated");
        Ok(count)
    }

    /// Submit a new product. Lands in `Pending` for moderation.
    pub async fn create(&self, owner: &str, draft: ProductDraft) -> Result<Product, CoreError> {
        if draft.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("product name is required".to_string()));
        }
        if draft.image_url.trim().is_empty() {
            return Err(CoreError::InvalidInput("image URL is required".to_string()));
        }

        let product = Product::new(owner, draft);
        self.products.insert(product.id, product.clone());

        if let Some(ref db) = self.db {
            db.products()
                .upsert(&product)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(product_id = %product.id, owner = %owner, "Product submitted");
        Ok(product)
    }

    pub fn get(&self, id: Uuid) -> Result<Product, CoreError> {
        self.products
            .get(&id)
            .map(|p| p.clone())
            .ok_or(CoreError::ProductNotFound(id))
    }

    /// Publicly browsable products: accepted, optionally filtered by tag.
    pub fn list_accepted(&self, tag: Option<&str>) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|p| p.status == ProductStatus::Accepted)
            .filter(|p| tag.map_or(true, |t| p.tags.contains(t)))
            .map(|p| p.clone())
            .collect();
        products.sort_by(|a, b| b.upvote_count().cmp(&a.upvote_count()));
        products
    }

    pub fn list_featured(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|p| p.is_featured && p.status == ProductStatus::Accepted)
            .map(|p| p.clone())
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    }

    /// Moderator view: pending submissions plus anything at or above the
    /// report threshold.
    pub fn moderation_queue(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|p| {
                p.status == ProductStatus::Pending || p.needs_review(self.report_threshold)
            })
            .map(|p| p.clone())
            .collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        products
    }

    /// Flip the caller's engagement on a product. The check-and-flip runs
    /// under the product's exclusive entry, so two concurrent toggles on
    /// the same product cannot race past each other.
    pub async fn toggle(
        &self,
        id: Uuid,
        user_key: &str,
        kind: EngagementKind,
    ) -> Result<ToggleOutcome, CoreError> {
        let outcome = {
            let mut entry = self
                .products
                .get_mut(&id)
                .ok_or(CoreError::ProductNotFound(id))?;
            engagement::toggle(&mut entry, user_key, kind, self.report_threshold)
        };

        if let Some(ref db) = self.db {
            db.products()
                .set_engagement(id, user_key, kind, outcome.active)
                .await
                .map_err(CoreError::Storage)?;
        }

        debug!(
            product_id = %id,
            user = %user_key,
            kind = %kind,
            active = outcome.active,
            count = outcome.count,
            "Engagement toggled"
        );
        Ok(outcome)
    }

    /// Moderation status transition. Engagement history is preserved
    /// across all transitions.
    pub async fn transition(&self, id: Uuid, to: ProductStatus) -> Result<Product, CoreError> {
        let product = {
            let mut entry = self
                .products
                .get_mut(&id)
                .ok_or(CoreError::ProductNotFound(id))?;

            let from = entry.status;
            if !from.can_transition_to(to) {
                return Err(CoreError::InvalidTransition { from, to });
            }

            entry.status = to;
            // A product leaving `Accepted` also leaves the featured rail.
            if to != ProductStatus::Accepted {
                entry.is_featured = false;
            }
            entry.updated_at = chrono::Utc::now();
            entry.clone()
        };

        if let Some(ref db) = self.db {
            db.products()
                .upsert(&product)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(product_id = %id, status = %to, "Product status changed");
        Ok(product)
    }

    /// Set or clear the featured overlay. Only valid while `Accepted`.
    pub async fn set_featured(&self, id: Uuid, featured: bool) -> Result<Product, CoreError> {
        let product = {
            let mut entry = self
                .products
                .get_mut(&id)
                .ok_or(CoreError::ProductNotFound(id))?;

            if entry.status != ProductStatus::Accepted {
                return Err(CoreError::InvalidFeatureTransition {
                    status: entry.status,
                });
            }

            entry.is_featured = featured;
            entry.updated_at = chrono::Utc::now();
            entry.clone()
        };

        if let Some(ref db) = self.db {
            db.products()
                .upsert(&product)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(product_id = %id, featured, "Featured flag changed");
        Ok(product)
    }

    /// Terminal deletion by the owner or a moderation role. The id stops
    /// resolving for every operation afterwards.
    pub async fn delete(&self, id: Uuid, actor: &AuthContext) -> Result<(), CoreError> {
        {
            let entry = self
                .products
                .get(&id)
                .ok_or(CoreError::ProductNotFound(id))?;

            let is_owner = entry.owner == actor.user_key;
            let is_moderation = Role::MODERATION.contains(&actor.role);
            if !is_owner && !is_moderation {
                return Err(CoreError::Unauthorized(
                    "requires product owner or moderation role".to_string(),
                ));
            }
        }

        self.products.remove(&id);

        if let Some(ref db) = self.db {
            db.products().delete(id).await.map_err(CoreError::Storage)?;
        }

        info!(product_id = %id, actor = %actor.user_key, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MembershipTier;
    use std::collections::HashSet;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(1)
    }

    fn draft(name: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: "desc".to_string(),
            tags: HashSet::from(["cli".to_string()]),
            image_url: "https://cdn.example.com/1.png".to_string(),
        }
    }

    fn ctx(user: &str, role: Role) -> AuthContext {
        AuthContext {
            user_key: user.to_string(),
            role,
            membership: MembershipTier::None,
        }
    }

    #[tokio::test]
    async fn test_toggle_on_missing_product_fails() {
        let catalog = catalog();
        let err = catalog
            .toggle(Uuid::new_v4(), "ada@example.com", EngagementKind::Upvote)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_feature_requires_accepted() {
        let catalog = catalog();
        let product = catalog
            .create("ada@example.com", draft("Termgraph"))
            .await
            .unwrap();

        let err = catalog.set_featured(product.id, true).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidFeatureTransition {
                status: ProductStatus::Pending
            }
        );

        catalog
            .transition(product.id, ProductStatus::Accepted)
            .await
            .unwrap();
        let featured = catalog.set_featured(product.id, true).await.unwrap();
        assert!(featured.is_featured);
    }

    #[tokio::test]
    async fn test_rejection_unfeatures_but_keeps_engagement() {
        let catalog = catalog();
        let product = catalog
            .create("ada@example.com", draft("Termgraph"))
            .await
            .unwrap();
        catalog
            .transition(product.id, ProductStatus::Accepted)
            .await
            .unwrap();
        catalog.set_featured(product.id, true).await.unwrap();
        catalog
            .toggle(product.id, "bob@example.com", EngagementKind::Upvote)
            .await
            .unwrap();

        let rejected = catalog
            .transition(product.id, ProductStatus::Rejected)
            .await
            .unwrap();
        assert!(!rejected.is_featured);
        assert_eq!(rejected.upvote_count(), 1);

        // Re-review back to accepted keeps the history too.
        let restored = catalog
            .transition(product.id, ProductStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(restored.upvote_count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_returns_to_pending() {
        let catalog = catalog();
        let product = catalog
            .create("ada@example.com", draft("Termgraph"))
            .await
            .unwrap();
        catalog
            .transition(product.id, ProductStatus::Accepted)
            .await
            .unwrap();

        let err = catalog
            .transition(product.id, ProductStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: ProductStatus::Accepted,
                to: ProductStatus::Pending
            }
        );
    }

    #[tokio::test]
    async fn test_delete_is_terminal_and_ownership_checked() {
        let catalog = catalog();
        let product = catalog
            .create("ada@example.com", draft("Termgraph"))
            .await
            .unwrap();

        let stranger = ctx("mallory@example.com", Role::User);
        assert!(matches!(
            catalog.delete(product.id, &stranger).await.unwrap_err(),
            CoreError::Unauthorized(_)
        ));

        let owner = ctx("ada@example.com", Role::User);
        catalog.delete(product.id, &owner).await.unwrap();

        assert!(matches!(
            catalog.get(product.id).unwrap_err(),
            CoreError::ProductNotFound(_)
        ));
        assert!(matches!(
            catalog
                .toggle(product.id, "ada@example.com", EngagementKind::Upvote)
                .await
                .unwrap_err(),
            CoreError::ProductNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_moderator_can_delete_other_owners_product() {
        let catalog = catalog();
        let product = catalog
            .create("ada@example.com", draft("Termgraph"))
            .await
            .unwrap();

        let moderator = ctx("mod@example.com", Role::Moderator);
        catalog.delete(product.id, &moderator).await.unwrap();
        assert!(catalog.get(product.id).is_err());
    }

    #[tokio::test]
    async fn test_moderation_queue_contains_pending_and_reported() {
        let catalog = catalog();
        let pending = catalog.create("a@x.com", draft("Pending one")).await.unwrap();
        let accepted = catalog.create("a@x.com", draft("Clean one")).await.unwrap();
        catalog
            .transition(accepted.id, ProductStatus::Accepted)
            .await
            .unwrap();
        let reported = catalog.create("a@x.com", draft("Odd one")).await.unwrap();
        catalog
            .transition(reported.id, ProductStatus::Accepted)
            .await
            .unwrap();
        catalog
            .toggle(reported.id, "c@x.com", EngagementKind::Report)
            .await
            .unwrap();

        let queue = catalog.moderation_queue();
        let ids: Vec<Uuid> = queue.iter().map(|p| p.id).collect();
        assert!(ids.contains(&pending.id));
        assert!(ids.contains(&reported.id));
        assert!(!ids.contains(&accepted.id));
    }

    #[tokio::test]
    async fn test_list_accepted_filters_and_ranks_by_upvotes() {
        let catalog = catalog();
        let low = catalog.create("a@x.com", draft("Low")).await.unwrap();
        let high = catalog.create("a@x.com", draft("High")).await.unwrap();
        for p in [low.id, high.id] {
            catalog.transition(p, ProductStatus::Accepted).await.unwrap();
        }
        for user in ["u1@x.com", "u2@x.com"] {
            catalog
                .toggle(high.id, user, EngagementKind::Upvote)
                .await
                .unwrap();
        }

        let listed = catalog.list_accepted(Some("cli"));
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, high.id);

        assert!(catalog.list_accepted(Some("hardware")).is_empty());
    }
}
