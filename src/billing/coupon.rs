//! Coupons and the discount engine.
//!
//! Codes are normalized (trimmed, uppercased) identically on store, on
//! validation and in audit logs, so the same coupon is referenced the same
//! way everywhere. A coupon is usable only while `active` and strictly
//! before its expiry instant.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::DatabasePool;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Flat,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Flat => "flat",
            DiscountType::Percent => "percent",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    /// Stored normalized; `normalize_code` is the only way in.
    pub code: String,
    pub discount_type: DiscountType,
    /// Minor currency units for flat discounts, whole percents otherwise.
    pub amount: i64,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// The validated discount handed to the verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Discount {
    pub discount_type: DiscountType,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponDraft {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Canonical coupon-code form used for storage, lookup and logging.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Apply a discount to a base amount. Never negative: oversized discounts
/// clamp to zero rather than erroring.
pub fn apply_discount(base_amount: i64, discount: &Discount) -> i64 {
    let reduction = match discount.discount_type {
        DiscountType::Flat => discount.amount,
        DiscountType::Percent => base_amount.saturating_mul(discount.amount) / 100,
    };
    (base_amount - reduction).max(0)
}

/// Coupon store with validation. Admin-managed; read path is the
/// verification workflow and the public validate endpoint.
pub struct CouponBook {
    coupons: DashMap<String, Coupon>,
    db: Option<Arc<DatabasePool>>,
}

impl CouponBook {
    pub fn new() -> Self {
        Self {
            coupons: DashMap::new(),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub async fn hydrate(&self) -> Result<usize, CoreError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let coupons = db.coupons().load_all().await.map_err(CoreError::Storage)?;
        let count = coupons.len();
        for coupon in coupons {
            self.coupons.insert(coupon.code.clone(), coupon);
        }

        info!(count, "Coupon book hydrated");
        Ok(count)
    }

    /// Create or replace a coupon definition.
    pub async fn upsert(&self, draft: CouponDraft) -> Result<Coupon, CoreError> {
        if draft.amount <= 0 {
            return Err(CoreError::InvalidInput(
                "discount amount must be positive".to_string(),
            ));
        }
        if draft.discount_type == DiscountType::Percent && draft.amount > 100 {
            return Err(CoreError::InvalidInput(
                "percent discount cannot exceed 100".to_string(),
            ));
        }

        let code = normalize_code(&draft.code);
        if code.is_empty() {
            return Err(CoreError::InvalidInput("coupon code is required".to_string()));
        }

        let coupon = Coupon {
            code: code.clone(),
            discount_type: draft.discount_type,
            amount: draft.amount,
            expires_at: draft.expires_at,
            active: draft.active,
            created_at: Utc::now(),
        };
        self.coupons.insert(code.clone(), coupon.clone());

        if let Some(ref db) = self.db {
            db.coupons()
                .upsert(&coupon)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(code = %code, kind = %coupon.discount_type, "Coupon saved");
        Ok(coupon)
    }

    pub fn list(&self) -> Vec<Coupon> {
        let mut coupons: Vec<Coupon> = self.coupons.iter().map(|c| c.clone()).collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        coupons
    }

    pub async fn remove(&self, code: &str) -> Result<(), CoreError> {
        let code = normalize_code(code);
        self.coupons
            .remove(&code)
            .ok_or_else(|| CoreError::CouponInvalid("unknown code".to_string()))?;

        if let Some(ref db) = self.db {
            db.coupons()
                .delete(&code)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(code = %code, "Coupon removed");
        Ok(())
    }

    /// Validate a code at `now`. Expiry is exclusive of the boundary
    /// instant: a coupon validated exactly at `expires_at` is invalid.
    pub fn validate(&self, code: &str, now: DateTime<Utc>) -> Result<Discount, CoreError> {
        let code = normalize_code(code);

        let coupon = self
            .coupons
            .get(&code)
            .ok_or_else(|| CoreError::CouponInvalid("unknown code".to_string()))?;

        if !coupon.active {
            return Err(CoreError::CouponInvalid("code is inactive".to_string()));
        }
        if now >= coupon.expires_at {
            return Err(CoreError::CouponInvalid("code has expired".to_string()));
        }

        debug!(code = %code, "Coupon validated");
        Ok(Discount {
            discount_type: coupon.discount_type,
            amount: coupon.amount,
        })
    }
}

impl Default for CouponBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn book_with(code: &str, discount_type: DiscountType, amount: i64) -> CouponBook {
        let book = CouponBook::new();
        book.upsert(CouponDraft {
            code: code.to_string(),
            discount_type,
            amount,
            expires_at: Utc::now() + Duration::days(30),
            active: true,
        })
        .await
        .unwrap();
        book
    }

    #[tokio::test]
    async fn test_validate_is_case_insensitive() {
        let book = book_with("SAVE20", DiscountType::Percent, 20).await;

        assert!(book.validate("save20", Utc::now()).is_ok());
        assert!(book.validate("  Save20 ", Utc::now()).is_ok());
        assert!(book.validate("BOGUS", Utc::now()).is_err());
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let book = CouponBook::new();
        let expires_at = Utc::now() + Duration::days(1);
        book.upsert(CouponDraft {
            code: "LAUNCH".to_string(),
            discount_type: DiscountType::Flat,
            amount: 500,
            expires_at,
            active: true,
        })
        .await
        .unwrap();

        assert!(book
            .validate("LAUNCH", expires_at - Duration::milliseconds(1))
            .is_ok());
        assert!(matches!(
            book.validate("LAUNCH", expires_at).unwrap_err(),
            CoreError::CouponInvalid(reason) if reason.contains("expired")
        ));
    }

    #[tokio::test]
    async fn test_inactive_code_is_invalid() {
        let book = CouponBook::new();
        book.upsert(CouponDraft {
            code: "PAUSED".to_string(),
            discount_type: DiscountType::Flat,
            amount: 100,
            expires_at: Utc::now() + Duration::days(30),
            active: false,
        })
        .await
        .unwrap();

        assert!(matches!(
            book.validate("PAUSED", Utc::now()).unwrap_err(),
            CoreError::CouponInvalid(reason) if reason.contains("inactive")
        ));
    }

    #[test]
    fn test_percent_apply_floors() {
        let discount = Discount {
            discount_type: DiscountType::Percent,
            amount: 20,
        };
        assert_eq!(apply_discount(50, &discount), 40);
        // 33% of 10 floors to 3.
        let third = Discount {
            discount_type: DiscountType::Percent,
            amount: 33,
        };
        assert_eq!(apply_discount(10, &third), 7);
    }

    #[test]
    fn test_apply_never_negative() {
        let flat = Discount {
            discount_type: DiscountType::Flat,
            amount: 10_000,
        };
        assert_eq!(apply_discount(50, &flat), 0);

        // Defensive: oversized percents clamp too.
        let oversized = Discount {
            discount_type: DiscountType::Percent,
            amount: 150,
        };
        assert_eq!(apply_discount(50, &oversized), 0);
        assert_eq!(apply_discount(0, &oversized), 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_amounts() {
        let book = CouponBook::new();
        assert!(book
            .upsert(CouponDraft {
                code: "ZERO".to_string(),
                discount_type: DiscountType::Flat,
                amount: 0,
                expires_at: Utc::now() + Duration::days(1),
                active: true,
            })
            .await
            .is_err());

        assert!(book
            .upsert(CouponDraft {
                code: "TOOMUCH".to_string(),
                discount_type: DiscountType::Percent,
                amount: 120,
                expires_at: Utc::now() + Duration::days(1),
                active: true,
            })
            .await
            .is_err());
    }
}
