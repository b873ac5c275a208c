//! Product model and moderation status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Moderation state of a product listing.
///
/// `Pending` is initial. Accepted and rejected products may move to each
/// other on re-review; nothing returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProductStatus {
    /// Whether the state machine permits `self -> to`.
    pub fn can_transition_to(&self, to: ProductStatus) -> bool {
        match (self, to) {
            // No self-loops, nothing back to pending.
            (from, to) if *from == to => false,
            (_, ProductStatus::Pending) => false,
            // pending -> accepted/rejected, accepted <-> rejected.
            (_, ProductStatus::Accepted) | (_, ProductStatus::Rejected) => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Pending => "pending",
            ProductStatus::Accepted => "accepted",
            ProductStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ProductStatus::Pending),
            "accepted" => Ok(ProductStatus::Accepted),
            "rejected" => Ok(ProductStatus::Rejected),
            other => Err(format!("Unknown product status: {other}")),
        }
    }
}

/// Fields supplied by the owner when submitting a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: HashSet<String>,
    /// Opaque URL into the object store; only checked for non-emptiness.
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub tags: HashSet<String>,
    pub image_url: String,
    pub status: ProductStatus,
    pub is_featured: bool,
    /// User keys that currently upvote this product. Uniqueness is the set
    /// invariant; counts are derived, never stored.
    pub upvoted_by: HashSet<String>,
    pub reported_by: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(owner: &str, draft: ProductDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            name: draft.name,
            description: draft.description,
            tags: draft.tags,
            image_url: draft.image_url,
            status: ProductStatus::Pending,
            is_featured: false,
            upvoted_by: HashSet::new(),
            reported_by: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn upvote_count(&self) -> usize {
        self.upvoted_by.len()
    }

    pub fn report_count(&self) -> usize {
        self.reported_by.len()
    }

    /// Advisory moderator signal: at or above the review threshold the
    /// product surfaces in the moderation queue. Never a status change.
    pub fn needs_review(&self, report_threshold: usize) -> bool {
        self.report_count() >= report_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: "A tool".to_string(),
            tags: HashSet::from(["devtools".to_string()]),
            image_url: "https://cdn.example.com/img/1.png".to_string(),
        }
    }

    #[test]
    fn test_new_product_is_pending_and_unfeatured() {
        let product = Product::new("ada@example.com", draft("Termgraph"));
        assert_eq!(product.status, ProductStatus::Pending);
        assert!(!product.is_featured);
        assert_eq!(product.upvote_count(), 0);
        assert_eq!(product.report_count(), 0);
    }

    #[test]
    fn test_transition_table() {
        use ProductStatus::*;

        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Accepted.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Accepted));

        // Nothing returns to pending, no self-loops.
        assert!(!Accepted.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Accepted.can_transition_to(Accepted));
    }

    #[test]
    fn test_needs_review_tracks_threshold() {
        let mut product = Product::new("ada@example.com", draft("Termgraph"));
        assert!(!product.needs_review(1));

        product.reported_by.insert("bob@example.com".to_string());
        assert!(product.needs_review(1));
        assert!(!product.needs_review(2));
    }
}
