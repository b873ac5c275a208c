//! Engagement toggles: upvotes and reports.
//!
//! A toggle flips the caller's membership in the relevant set: add if
//! absent, remove if present. This is the only mutation path for the sets,
//! which is what makes duplicate client submissions safe — an even number
//! of identical requests is a no-op and an odd number equals exactly one.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::directory::product::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Upvote,
    Report,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Upvote => "upvote",
            EngagementKind::Report => "report",
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a toggle: whether the caller's engagement is now active, and
/// the resulting aggregate count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub active: bool,
    pub count: usize,
    /// Advisory signal for reports: the product is at or above the review
    /// threshold after this toggle.
    pub needs_review: bool,
}

/// Flip `user_key` in the product's engagement set for `kind`.
///
/// Must run inside the product's exclusive store entry so the membership
/// check and the flip are one critical section.
pub(crate) fn toggle(
    product: &mut Product,
    user_key: &str,
    kind: EngagementKind,
    report_threshold: usize,
) -> ToggleOutcome {
    let set = match kind {
        EngagementKind::Upvote => &mut product.upvoted_by,
        EngagementKind::Report => &mut product.reported_by,
    };

    let active = if set.contains(user_key) {
        set.remove(user_key);
        false
    } else {
        set.insert(user_key.to_string());
        true
    };

    let count = set.len();
    let needs_review =
        kind == EngagementKind::Report && product.needs_review(report_threshold);

    if needs_review && active {
        // Crossing surfaces the product to moderators; status is untouched.
        info!(
            product_id = %product.id,
            report_count = count,
            "Product flagged for moderator review"
        );
    }

    product.updated_at = chrono::Utc::now();

    ToggleOutcome {
        active,
        count,
        needs_review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::product::ProductDraft;
    use std::collections::HashSet;

    fn product() -> Product {
        Product::new(
            "owner@example.com",
            ProductDraft {
                name: "Termgraph".to_string(),
                description: "Terminal graphing".to_string(),
                tags: HashSet::new(),
                image_url: "https://cdn.example.com/1.png".to_string(),
            },
        )
    }

    #[test]
    fn test_toggle_on_then_off() {
        let mut p = product();

        let on = toggle(&mut p, "ada@example.com", EngagementKind::Upvote, 1);
        assert!(on.active);
        assert_eq!(on.count, 1);

        let off = toggle(&mut p, "ada@example.com", EngagementKind::Upvote, 1);
        assert!(!off.active);
        assert_eq!(off.count, 0);
        assert!(p.upvoted_by.is_empty());
    }

    #[test]
    fn test_even_number_of_toggles_is_identity() {
        let mut p = product();
        for _ in 0..6 {
            toggle(&mut p, "ada@example.com", EngagementKind::Upvote, 1);
        }
        assert_eq!(p.upvote_count(), 0);

        for _ in 0..5 {
            toggle(&mut p, "ada@example.com", EngagementKind::Upvote, 1);
        }
        assert_eq!(p.upvote_count(), 1);
        assert!(p.upvoted_by.contains("ada@example.com"));
    }

    #[test]
    fn test_counts_always_match_set_cardinality() {
        let mut p = product();
        let users = ["a@x.com", "b@x.com", "c@x.com"];

        for user in users {
            let out = toggle(&mut p, user, EngagementKind::Report, 2);
            assert_eq!(out.count, p.reported_by.len());
        }
        assert_eq!(p.report_count(), 3);

        toggle(&mut p, "b@x.com", EngagementKind::Report, 2);
        assert_eq!(p.report_count(), 2);
    }

    #[test]
    fn test_report_threshold_signal_is_advisory() {
        let mut p = product();
        let status_before = p.status;

        let out = toggle(&mut p, "ada@example.com", EngagementKind::Report, 1);
        assert!(out.needs_review);
        assert_eq!(p.status, status_before);

        // Toggling the report off drops the signal with the count.
        let out = toggle(&mut p, "ada@example.com", EngagementKind::Report, 1);
        assert!(!out.needs_review);
    }

    #[test]
    fn test_upvote_never_sets_review_signal() {
        let mut p = product();
        let out = toggle(&mut p, "ada@example.com", EngagementKind::Upvote, 0);
        assert!(!out.needs_review);
    }
}
