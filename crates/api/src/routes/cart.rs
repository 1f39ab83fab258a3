//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::CartView;
use common::ProductId;
use domain::Owner;
use serde::Deserialize;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::identify;
use crate::routes::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct ApplyPromoRequest {
    pub code: String,
}

async fn acting_owner<S: Store>(
    state: &AppState<S>,
    headers: &HeaderMap,
) -> Result<Owner, ApiError> {
    let identity = identify(state, headers).await?;
    Ok(state
        .carts
        .resolve_owner(identity.user_id, identity.session_id)
        .await?)
}

/// GET /cart — the derived cart view.
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    Ok(Json(state.carts.view(owner).await?))
}

/// POST /cart/items — adds a product to the cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    let view = state
        .carts
        .add_item(owner, ProductId::from_uuid(req.product_id), req.quantity)
        .await?;
    Ok(Json(view))
}

/// PUT /cart/items/{product_id} — sets a line quantity (zero removes).
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    let view = state
        .carts
        .update_item(owner, ProductId::from_uuid(product_id), req.quantity)
        .await?;
    Ok(Json(view))
}

/// DELETE /cart/items/{product_id} — removes a line.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    let view = state
        .carts
        .remove_item(owner, ProductId::from_uuid(product_id))
        .await?;
    Ok(Json(view))
}

/// DELETE /cart/items — empties the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn clear<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    Ok(Json(state.carts.clear(owner).await?))
}

/// POST /cart/promo — applies a promo code.
#[tracing::instrument(skip(state, headers, req))]
pub async fn apply_promo<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<ApplyPromoRequest>,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    Ok(Json(state.carts.apply_promo(owner, &req.code).await?))
}

/// DELETE /cart/promo — removes the applied promo.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_promo<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartView>, ApiError> {
    let owner = acting_owner(&state, &headers).await?;
    Ok(Json(state.carts.remove_promo(owner).await?))
}
