//! Verification workflow: paid membership upgrades.
//!
//! `confirm` is the single point where a user's membership may change. It
//! is idempotent under webhook-style redelivery: a repeated confirmation
//! matching the payment's terminal status is a silent success returning
//! the same result, and a conflicting one is rejected. Each payment is
//! guarded by its own async mutex, so two concurrent deliveries of the
//! same confirmation serialize instead of double-applying.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{MembershipTier, UserDirectory};
use crate::billing::coupon::{apply_discount, normalize_code, CouponBook};
use crate::billing::gateway::PaymentGateway;
use crate::billing::payment::{Payment, PaymentStatus};
use crate::database::DatabasePool;
use crate::error::CoreError;

/// Outcome of a confirmation, returned identically on replay.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipResult {
    pub payment: Payment,
    pub membership: MembershipTier,
}

/// Pricing for the verification purchase.
#[derive(Debug, Clone)]
pub struct VerificationPricing {
    /// Base price in minor currency units.
    pub base_price: i64,
    pub currency: String,
}

pub struct VerificationWorkflow {
    payments: DashMap<Uuid, Arc<Mutex<Payment>>>,
    users: Arc<UserDirectory>,
    coupons: Arc<CouponBook>,
    gateway: Arc<dyn PaymentGateway>,
    pricing: VerificationPricing,
    db: Option<Arc<DatabasePool>>,
}

impl VerificationWorkflow {
    pub fn new(
        users: Arc<UserDirectory>,
        coupons: Arc<CouponBook>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: VerificationPricing,
    ) -> Self {
        Self {
            payments: DashMap::new(),
            users,
            coupons,
            gateway,
            pricing,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn pricing(&self) -> &VerificationPricing {
        &self.pricing
    }

    pub async fn hydrate(&self) -> Result<usize, CoreError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let payments = db.payments().load_all().await.map_err(CoreError::Storage)?;
        let count = payments.len();
        for payment in payments {
            self.payments
                .insert(payment.id, Arc::new(Mutex::new(payment)));
        }

        info!(count, "Payments hydrated");
        Ok(count)
    }

    /// Start a verification purchase: price the charge (applying a coupon
    /// if supplied), create it with the configured gateway and record the
    /// pending payment. Gateway failures surface as retryable; the caller
    /// simply initiates a new payment.
    pub async fn initiate(
        &self,
        user_key: &str,
        coupon_code: Option<&str>,
    ) -> Result<Payment, CoreError> {
        let (amount, applied_code) = match coupon_code {
            Some(code) => {
                let discount = self.coupons.validate(code, Utc::now())?;
                let normalized = normalize_code(code);
                let amount = apply_discount(self.pricing.base_price, &discount);
                info!(
                    user = %user_key,
                    coupon = %normalized,
                    amount,
                    "Coupon applied to verification price"
                );
                (amount, Some(normalized))
            }
            None => (self.pricing.base_price, None),
        };

        let mut metadata = HashMap::new();
        metadata.insert("purpose".to_string(), "verification".to_string());
        metadata.insert("user".to_string(), user_key.to_string());

        let intent = self
            .gateway
            .create_charge(amount, &self.pricing.currency, &metadata)
            .await
            .map_err(|e| CoreError::UpstreamGateway(e.to_string()))?;

        let payment = Payment::new(
            user_key,
            amount,
            &self.pricing.currency,
            applied_code,
            intent,
        );
        self.payments
            .insert(payment.id, Arc::new(Mutex::new(payment.clone())));

        if let Some(ref db) = self.db {
            db.payments()
                .upsert(&payment)
                .await
                .map_err(CoreError::Storage)?;
        }

        info!(payment_id = %payment.id, user = %user_key, amount, "Payment initiated");
        Ok(payment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Payment, CoreError> {
        let entry = self
            .payments
            .get(&id)
            .map(|e| e.clone())
            .ok_or(CoreError::PaymentNotFound(id))?;
        let payment = entry.lock().await;
        Ok(payment.clone())
    }

    /// Reconcile an external confirmation into the payment and, on first
    /// success, into the user's membership. Serialized per payment id.
    pub async fn confirm(
        &self,
        id: Uuid,
        external_status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<MembershipResult, CoreError> {
        if !external_status.is_terminal() {
            // An ambiguous outcome never guesses; the payment stays
            // pending for the reconciliation path.
            return Err(CoreError::InvalidInput(
                "confirmation status must be succeeded or failed".to_string(),
            ));
        }

        let entry = self
            .payments
            .get(&id)
            .map(|e| e.clone())
            .ok_or(CoreError::PaymentNotFound(id))?;
        let mut payment = entry.lock().await;

        match (payment.status, external_status) {
            (PaymentStatus::Pending, PaymentStatus::Succeeded) => {
                // Membership first: if the upgrade cannot be recorded the
                // payment stays pending and the confirmation is re-runnable,
                // so no half-applied state outlives the operation.
                let user = self
                    .users
                    .set_membership(&payment.user_key, MembershipTier::Verified)
                    .await?;

                payment.status = PaymentStatus::Succeeded;
                payment.confirmed_at = Some(Utc::now());
                self.persist(&payment).await?;

                info!(
                    payment_id = %payment.id,
                    user = %payment.user_key,
                    "Payment confirmed, membership verified"
                );
                Ok(MembershipResult {
                    payment: payment.clone(),
                    membership: user.membership,
                })
            }
            (PaymentStatus::Pending, PaymentStatus::Failed) => {
                payment.status = PaymentStatus::Failed;
                payment.failure_reason =
                    Some(failure_reason.unwrap_or_else(|| "payment was declined".to_string()));
                payment.confirmed_at = Some(Utc::now());
                self.persist(&payment).await?;

                warn!(
                    payment_id = %payment.id,
                    user = %payment.user_key,
                    reason = payment.failure_reason.as_deref().unwrap_or(""),
                    "Payment failed"
                );
                Ok(MembershipResult {
                    payment: payment.clone(),
                    membership: self.membership_of(&payment.user_key).await,
                })
            }
            (current, requested) if current == requested => {
                // Webhook redelivery: same terminal status, same result,
                // no second membership credit.
                Ok(MembershipResult {
                    payment: payment.clone(),
                    membership: self.membership_of(&payment.user_key).await,
                })
            }
            (current, requested) => Err(CoreError::ConflictingTerminalState {
                current,
                requested,
            }),
        }
    }

    async fn membership_of(&self, user_key: &str) -> MembershipTier {
        self.users
            .get(user_key)
            .await
            .map(|u| u.membership)
            .unwrap_or_default()
    }

    async fn persist(&self, payment: &Payment) -> Result<(), CoreError> {
        if let Some(ref db) = self.db {
            db.payments()
                .upsert(payment)
                .await
                .map_err(CoreError::Storage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::IdentityProfile;
    use crate::billing::coupon::{CouponDraft, DiscountType};
    use crate::billing::gateway::StaticGateway;
    use chrono::Duration;

    async fn workflow() -> (VerificationWorkflow, Arc<UserDirectory>) {
        let users = Arc::new(UserDirectory::new());
        users
            .provision(&IdentityProfile {
                email: "ada@example.com".to_string(),
                display_name: "Ada".to_string(),
                avatar_url: None,
            })
            .await
            .unwrap();

        let coupons = Arc::new(CouponBook::new());
        coupons
            .upsert(CouponDraft {
                code: "SAVE20".to_string(),
                discount_type: DiscountType::Percent,
                amount: 20,
                expires_at: Utc::now() + Duration::days(30),
                active: true,
            })
            .await
            .unwrap();

        let workflow = VerificationWorkflow::new(
            users.clone(),
            coupons,
            Arc::new(StaticGateway::new()),
            VerificationPricing {
                base_price: 50,
                currency: "USD".to_string(),
            },
        );
        (workflow, users)
    }

    #[tokio::test]
    async fn test_initiate_applies_coupon() {
        let (workflow, _) = workflow().await;

        let full = workflow.initiate("ada@example.com", None).await.unwrap();
        assert_eq!(full.amount, 50);
        assert_eq!(full.status, PaymentStatus::Pending);

        let discounted = workflow
            .initiate("ada@example.com", Some("save20"))
            .await
            .unwrap();
        assert_eq!(discounted.amount, 40);
        assert_eq!(discounted.coupon_code.as_deref(), Some("SAVE20"));
    }

    #[tokio::test]
    async fn test_initiate_with_unknown_coupon_fails_without_charge() {
        let (workflow, _) = workflow().await;

        let err = workflow
            .initiate("ada@example.com", Some("BOGUS"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CouponInvalid(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_is_retryable_upstream_error() {
        let users = Arc::new(UserDirectory::new());
        let workflow = VerificationWorkflow::new(
            users,
            Arc::new(CouponBook::new()),
            Arc::new(StaticGateway::failing()),
            VerificationPricing {
                base_price: 50,
                currency: "USD".to_string(),
            },
        );

        let err = workflow.initiate("ada@example.com", None).await.unwrap_err();
        assert!(matches!(err, CoreError::UpstreamGateway(_)));
    }

    #[tokio::test]
    async fn test_first_success_upgrades_membership() {
        let (workflow, users) = workflow().await;
        let payment = workflow.initiate("ada@example.com", None).await.unwrap();

        let result = workflow
            .confirm(payment.id, PaymentStatus::Succeeded, None)
            .await
            .unwrap();

        assert_eq!(result.payment.status, PaymentStatus::Succeeded);
        assert_eq!(result.membership, MembershipTier::Verified);
        assert!(users
            .get("ada@example.com")
            .await
            .unwrap()
            .membership
            .is_verified());
    }

    #[tokio::test]
    async fn test_replayed_success_is_idempotent() {
        let (workflow, _) = workflow().await;
        let payment = workflow.initiate("ada@example.com", None).await.unwrap();

        let first = workflow
            .confirm(payment.id, PaymentStatus::Succeeded, None)
            .await
            .unwrap();
        let second = workflow
            .confirm(payment.id, PaymentStatus::Succeeded, None)
            .await
            .unwrap();

        assert_eq!(first.payment.status, second.payment.status);
        assert_eq!(first.membership, second.membership);
        assert_eq!(
            first.payment.confirmed_at, second.payment.confirmed_at,
            "replay must not re-stamp the confirmation"
        );
    }

    #[tokio::test]
    async fn test_conflicting_terminal_status_is_rejected() {
        let (workflow, users) = workflow().await;
        let payment = workflow.initiate("ada@example.com", None).await.unwrap();

        workflow
            .confirm(payment.id, PaymentStatus::Failed, Some("card declined".into()))
            .await
            .unwrap();

        let err = workflow
            .confirm(payment.id, PaymentStatus::Succeeded, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::ConflictingTerminalState {
                current: PaymentStatus::Failed,
                requested: PaymentStatus::Succeeded,
            }
        );

        // A failed payment never resurrects into a membership.
        assert!(!users
            .get("ada@example.com")
            .await
            .unwrap()
            .membership
            .is_verified());
    }

    #[tokio::test]
    async fn test_failed_confirmation_keeps_amount_for_retry_ux() {
        let (workflow, _) = workflow().await;
        let payment = workflow
            .initiate("ada@example.com", Some("SAVE20"))
            .await
            .unwrap();

        let result = workflow
            .confirm(payment.id, PaymentStatus::Failed, Some("insufficient funds".into()))
            .await
            .unwrap();

        assert_eq!(result.payment.status, PaymentStatus::Failed);
        assert_eq!(result.payment.amount, 40);
        assert_eq!(result.payment.currency, "USD");
        assert_eq!(
            result.payment.failure_reason.as_deref(),
            Some("insufficient funds")
        );
        assert_eq!(result.membership, MembershipTier::None);
    }

    #[tokio::test]
    async fn test_ambiguous_status_leaves_payment_pending() {
        let (workflow, _) = workflow().await;
        let payment = workflow.initiate("ada@example.com", None).await.unwrap();

        let err = workflow
            .confirm(payment.id, PaymentStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let current = workflow.get(payment.id).await.unwrap();
        assert_eq!(current.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_payment_id() {
        let (workflow, _) = workflow().await;
        let err = workflow
            .confirm(Uuid::new_v4(), PaymentStatus::Succeeded, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_confirms_apply_one_upgrade() {
        let (workflow, users) = workflow().await;
        let workflow = Arc::new(workflow);
        let payment = workflow.initiate("ada@example.com", None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let workflow = workflow.clone();
            let id = payment.id;
            handles.push(tokio::spawn(async move {
                workflow.confirm(id, PaymentStatus::Succeeded, None).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let user = users.get("ada@example.com").await.unwrap();
        assert!(user.membership.is_verified());
        let final_payment = workflow.get(payment.id).await.unwrap();
        assert_eq!(final_payment.status, PaymentStatus::Succeeded);
    }
}
