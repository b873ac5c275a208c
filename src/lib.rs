//! Launchboard
//!
//! Backend core for a product directory: browse/submit/upvote/report tech
//! products, role-gated moderation, and a paid "verified" membership
//! reconciled from an external payment gateway.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Core error taxonomy
//! ├── auth/          - Roles, identity resolution, user directory
//! │   ├── role.rs       - Role/membership enums
//! │   ├── identity.rs   - Identity provider boundary
//! │   └── gate.rs       - Authorization gate + user store
//! ├── directory/     - Product catalog
//! │   ├── product.rs    - Product model & status machine
//! │   ├── engagement.rs - Upvote/report toggles
//! │   └── catalog.rs    - Per-product serialized operations
//! ├── billing/       - Verification purchases
//! │   ├── coupon.rs     - Coupons & discount engine
//! │   ├── gateway.rs    - Card/regional payment gateways
//! │   ├── payment.rs    - Payment records
//! │   └── verification.rs - Initiate/confirm workflow
//! ├── api/           - HTTP endpoints + middleware
//! └── database/      - PostgreSQL persistence
//! ```

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;

// Re-export main types for convenience
pub use auth::{
    AuthContext, AuthorizationGate, HttpIdentityProvider, IdentityProfile, IdentityProvider,
    MembershipTier, Role, StaticIdentityProvider, User, UserDirectory,
};
pub use billing::{
    apply_discount, normalize_code, CardGateway, Coupon, CouponBook, CouponDraft, Discount,
    DiscountType, GatewayKind, MembershipResult, Payment, PaymentGateway, PaymentStatus,
    RegionalGateway, StaticGateway, VerificationPricing, VerificationWorkflow,
};
pub use config::AppConfig;
pub use database::DatabasePool;
pub use directory::{
    EngagementKind, Product, ProductCatalog, ProductDraft, ProductStatus, ToggleOutcome,
};
pub use error::CoreError;
