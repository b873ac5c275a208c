//! HTTP API endpoints for the product directory
//!
//! Provides REST APIs for:
//! - Products (browse, submit, engagement toggles, moderation)
//! - Coupons (validation, admin management)
//! - Payments (verification purchase lifecycle)
//! - Users (profile, admin role management)
//! - Request middleware (identity resolution, body limits, headers)

pub mod coupons;
pub mod middleware;
pub mod payments;
pub mod products;
pub mod users;

pub use coupons::{create_router as create_coupons_router, CouponsApiState};
pub use middleware::{
    body_size_middleware, identity_middleware, security_headers_middleware, MaybeAuth,
    RequestGuardState,
};
pub use payments::{create_router as create_payments_router, PaymentsApiState};
pub use products::{create_router as create_products_router, ProductsApiState};
pub use users::{create_router as create_users_router, UsersApiState};
