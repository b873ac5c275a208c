//! User API endpoints
//!
//! Caller profile plus admin role management.

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::middleware::MaybeAuth;
use crate::auth::{AuthorizationGate, MembershipTier, Role, User, UserDirectory};
use crate::error::CoreError;

/// API state for user endpoints
#[derive(Clone)]
pub struct UsersApiState {
    pub directory: Arc<UserDirectory>,
    pub gate: Arc<AuthorizationGate>,
}

// Request/response types

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub membership: MembershipTier,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

fn render(user: &User) -> UserResponse {
    UserResponse {
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        avatar_url: user.avatar_url.clone(),
        role: user.role,
        membership: user.membership,
    }
}

// Endpoints

/// GET /users/me - The caller's resolved profile
pub async fn me(
    State(state): State<UsersApiState>,
    Extension(auth): Extension<MaybeAuth>,
) -> Result<Json<UserResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let user = state
        .directory
        .get(&ctx.user_key)
        .await
        .ok_or_else(|| CoreError::UserNotFound(ctx.user_key.clone()))?;
    Ok(Json(render(&user)))
}

/// PATCH /users/{email}/role - Change a user's role (admin)
pub async fn change_role(
    State(state): State<UsersApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(email): Path<String>,
    Json(request): Json<RoleChangeRequest>,
) -> Result<Json<UserResponse>, CoreError> {
    state
        .gate
        .authorize(auth.0.as_ref(), Role::ROLE_MANAGEMENT)?;
    let user = state.directory.set_role(&email, request.role).await?;
    Ok(Json(render(&user)))
}

/// Create the users API router
pub fn create_router(state: UsersApiState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/{email}/role", patch(change_role))
        .with_state(state)
}
