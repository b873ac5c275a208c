//! Billing: coupons, payment gateways and the verification workflow.

pub mod coupon;
pub mod gateway;
pub mod payment;
pub mod verification;

pub use coupon::{apply_discount, normalize_code, Coupon, CouponBook, CouponDraft, Discount, DiscountType};
pub use gateway::{
    CardGateway, ChargeIntent, GatewayConfig, GatewayError, GatewayKind, PaymentGateway,
    RegionalGateway, StaticGateway,
};
pub use payment::{Payment, PaymentStatus};
pub use verification::{MembershipResult, VerificationPricing, VerificationWorkflow};
