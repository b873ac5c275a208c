//! Product API endpoints
//!
//! Browse, submit, engagement toggles and moderation actions.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::MaybeAuth;
use crate::auth::{AuthorizationGate, Role};
use crate::directory::{EngagementKind, Product, ProductCatalog, ProductDraft, ProductStatus};
use crate::error::CoreError;

/// API state for product endpoints
#[derive(Clone)]
pub struct ProductsApiState {
    pub catalog: Arc<ProductCatalog>,
    pub gate: Arc<AuthorizationGate>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub image_url: String,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub upvote_count: usize,
    pub report_count: usize,
    pub needs_review: bool,
    pub created_at: String,
}

impl ProductsApiState {
    fn render(&self, product: &Product) -> ProductResponse {
        let mut tags: Vec<String> = product.tags.iter().cloned().collect();
        tags.sort();

        ProductResponse {
            id: product.id,
            owner: product.owner.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            tags,
            image_url: product.image_url.clone(),
            status: product.status,
            is_featured: product.is_featured,
            upvote_count: product.upvote_count(),
            report_count: product.report_count(),
            needs_review: product.needs_review(self.catalog.report_threshold()),
            created_at: product.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub active: bool,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub featured: bool,
}

// Endpoints

/// POST /products - Submit a new product (lands pending)
pub async fn create_product(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<ProductResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let product = state.catalog.create(&ctx.user_key, draft).await?;
    Ok(Json(state.render(&product)))
}

/// GET /products - Browse accepted products
pub async fn list_products(
    State(state): State<ProductsApiState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ProductResponse>> {
    let products = state.catalog.list_accepted(query.tag.as_deref());
    Json(products.iter().map(|p| state.render(p)).collect())
}

/// GET /products/featured - Featured rail
pub async fn featured_products(
    State(state): State<ProductsApiState>,
) -> Json<Vec<ProductResponse>> {
    let products = state.catalog.list_featured();
    Json(products.iter().map(|p| state.render(p)).collect())
}

/// GET /products/queue - Moderation queue (pending + reported)
pub async fn moderation_queue(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
) -> Result<Json<Vec<ProductResponse>>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), Role::MODERATION)?;
    let products = state.catalog.moderation_queue();
    Ok(Json(products.iter().map(|p| state.render(p)).collect()))
}

/// GET /products/{id} - Product detail
///
/// Unaccepted products resolve only for their owner and moderation roles;
/// everyone else sees not-found rather than a listing in review.
pub async fn get_product(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, CoreError> {
    let product = state.catalog.get(id)?;

    if product.status != ProductStatus::Accepted {
        let visible = auth.0.as_ref().is_some_and(|ctx| {
            ctx.user_key == product.owner || Role::MODERATION.contains(&ctx.role)
        });
        if !visible {
            return Err(CoreError::ProductNotFound(id));
        }
    }

    Ok(Json(state.render(&product)))
}

/// POST /products/{id}/upvote - Toggle the caller's upvote
pub async fn toggle_upvote(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let outcome = state
        .catalog
        .toggle(id, &ctx.user_key, EngagementKind::Upvote)
        .await?;
    Ok(Json(ToggleResponse {
        active: outcome.active,
        count: outcome.count,
    }))
}

/// POST /products/{id}/report - Toggle the caller's report
pub async fn toggle_report(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    let outcome = state
        .catalog
        .toggle(id, &ctx.user_key, EngagementKind::Report)
        .await?;
    Ok(Json(ToggleResponse {
        active: outcome.active,
        count: outcome.count,
    }))
}

/// PATCH /products/{id}/status - Moderation status transition
pub async fn change_status(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<Json<ProductResponse>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), Role::MODERATION)?;
    let product = state.catalog.transition(id, request.status).await?;
    Ok(Json(state.render(&product)))
}

/// PATCH /products/{id}/feature - Featured overlay (accepted products only)
pub async fn set_feature(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<ProductResponse>, CoreError> {
    state.gate.authorize(auth.0.as_ref(), Role::MODERATION)?;
    let product = state.catalog.set_featured(id, request.featured).await?;
    Ok(Json(state.render(&product)))
}

/// DELETE /products/{id} - Terminal deletion (owner or moderation)
pub async fn delete_product(
    State(state): State<ProductsApiState>,
    Extension(auth): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let ctx = state.gate.authorize(auth.0.as_ref(), Role::ANY)?;
    state.catalog.delete(id, ctx).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Create the products API router
pub fn create_router(state: ProductsApiState) -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/featured", get(featured_products))
        .route("/queue", get(moderation_queue))
        .route("/{id}", get(get_product).delete(delete_product))
        .route("/{id}/upvote", post(toggle_upvote))
        .route("/{id}/report", post(toggle_report))
        .route("/{id}/status", patch(change_status))
        .route("/{id}/feature", patch(set_feature))
        .with_state(state)
}
