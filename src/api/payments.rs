//! Payment API endpoints
//!
//! Verification purchase lifecycle: initiate a charge, confirm its
//! outcome, and re-check status for reconciliation. Gateway redirect
//! callbacks and server-pushed notifications are both normalized into the
//! single confirm endpoint.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::MaybeAuth;
use crate::auth::{AuthContext, AuthorizationGate, MembershipTier, Role};
use crate::billing::{Payment, PaymentStatus, VerificationWorkflow};
use crate::error::CoreError;

/// API state for payment endpoints
#[derive(Clone)]
pub struct PaymentsApiState {
    pub workflow: Arc<VerificationWorkflow>,
    pub gate: Arc<AuthorizationGate>,
}

// Request/response types

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub status: PaymentStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub payment: PaymentResponse,
    pub membership: MembershipTier,
}

fn render(payment: &Payment) -> PaymentResponse {
    PaymentResponse {
        id: payment.id,
        amount: payment.amount,
        currency: payment.currency.clone(),
        coupon_code: payment.coupon_code.clone(),
        status: payment.status,
        client_secret: payment.client_secret.clone(),
        redirect_url: payment.redirect_url.clone(),
        failure_reason: payment.failure_reason.clone(),
        created_at: payment.created_at.to_rfc3339(),
    }
}

/// Payments are visible to their owner and to admins.
fn check_access(ctx: &AuthContext, payment: &Payment) -> Result<(), CoreError> {
    if payment.user_key == ctx.user_key || ctx.role == Role::Admin {
        Ok(())
    } else {
        Err(CoreError::Unauthorized(
            "requires payment owner or admin".to_string(),
        ))
    }
}

// Endpoints

/// POST /payments - Initiate a verification purchase
pub async fn initiate_payment(
    State(state): State<PaymentsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Json(request): Json<InitiateRequest>,
) -> Result<Json<PaymentResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let payment = state
        .workflow
        .initiate(&ctx.user_key, request.coupon_code.as_deref())
        .await?;
    Ok(Json(render(&payment)))
}

/// PATCH /payments/{id}/confirm - Reconcile an external confirmation
pub async fn confirm_payment(
    State(state): State<PaymentsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let payment = state.workflow.get(id).await?;
    check_access(ctx, &payment)?;

    let result = state
        .workflow
        .confirm(id, request.status, request.reason)
        .await?;
    Ok(Json(ConfirmResponse {
        payment: render(&result.payment),
        membership: result.membership,
    }))
}

/// GET /payments/{id} - Status re-check (reconciliation path)
pub async fn get_payment(
    State(state): State<PaymentsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let payment = state.workflow.get(id).await?;
    check_access(ctx, &payment)?;
    Ok(Json(render(&payment)))
}

/// Create the payments API router
pub fn create_router(state: PaymentsApiState) -> Router {
    Router::new()
        .route("/", post(initiate_payment))
        .route("/{id}", get(get_payment))
        .route("/{id}/confirm", patch(confirm_payment))
        .with_state(state)
}
