//! Coupon API endpoints
//!
//! Public validation for the checkout flow plus admin management.

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::middleware::MaybeAuth;
use crate::auth::{AuthorizationGate, Role};
use crate::billing::{apply_discount, normalize_code, Coupon, CouponBook, CouponDraft, DiscountType, VerificationPricing};
use crate::error::CoreError;

/// API state for coupon endpoints
#[derive(Clone)]
pub struct CouponsApiState {
    pub coupons: Arc<CouponBook>,
    pub gate: Arc<AuthorizationGate>,
    pub pricing: VerificationPricing,
}

// Request/response types

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: i64,
    /// Verification price after this discount, for checkout display.
    pub final_amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CouponResponse {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: i64,
    pub expires_at: String,
    pub active: bool,
}

fn render(coupon: &Coupon) -> CouponResponse {
    CouponResponse {
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        amount: coupon.amount,
        expires_at: coupon.expires_at.to_rfc3339(),
        active: coupon.active,
    }
}

// Endpoints

/// POST /coupons/validate - Validate a code for the checkout flow
pub async fn validate_coupon(
    State(state): State<CouponsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), Role::ANY)?;

    let discount = state.coupons.validate(&request.code, Utc::now())?;
    let final_amount = apply_discount(state.pricing.base_price, &discount);

    Ok(Json(ValidateResponse {
        code: normalize_code(&request.code),
        discount_type: discount.discount_type,
        discount_amount: discount.amount,
        final_amount,
        currency: state.pricing.currency.clone(),
    }))
}

/// POST /coupons - Create or replace a coupon (admin)
pub async fn create_coupon(
    State(state): State<CouponsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Json(draft): Json<CouponDraft>,
) -> Result<Json<CouponResponse>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), &[Role::Admin])?;
    let coupon = state.coupons.upsert(draft).await?;
    Ok(Json(render(&coupon)))
}

/// GET /coupons - List coupons (admin)
pub async fn list_coupons(
    State(state): State<CouponsApiState>,
    Extension(auth): Extension<MaybeAuth>,
) -> Result<Json<Vec<CouponResponse>>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), &[Role::Admin])?;
    Ok(Json(state.coupons.list().iter().map(render).collect()))
}

/// DELETE /coupons/{code} - Remove a coupon (admin)
pub async fn delete_coupon(
    State(state): State<CouponsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), &[Role::Admin])?;
    state.coupons.remove(&code).await?;
    Ok(Json(serde_json::json!({ "deleted": normalize_code(&code) })))
}

/// Create the coupons API router
pub fn create_router(state: CouponsApiState) -> Router {
    Router::new()
        .route("/", post(create_coupon).get(list_coupons))
        .route("/validate", post(validate_coupon))
        .route("/{code}", delete(delete_coupon))
        .with_state(state)
}
