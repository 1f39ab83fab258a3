//! Read-only catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::ProductId;
use domain::Product;
use serde::Serialize;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::identify;
use crate::routes::AppState;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    /// Purchase cost, shown to administrators only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_cents: Option<i64>,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ProductResponse {
    fn from_product(product: Product, is_admin: bool) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            cost_cents: if is_admin {
                product.cost.map(|c| c.cents())
            } else {
                None
            },
            stock_quantity: product.stock_quantity,
            is_active: product.is_active,
            category: product.category,
            image_url: product.image_url,
        }
    }
}

/// GET /products — lists active catalog products.
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let products = state.carts.list_products().await?;
    Ok(Json(
        products
            .into_iter()
            .map(|p| ProductResponse::from_product(p, identity.is_admin))
            .collect(),
    ))
}

/// GET /products/{id} — loads a single product.
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let product = state
        .carts
        .get_product(ProductId::from_uuid(id))
        .await?;
    Ok(Json(ProductResponse::from_product(product, identity.is_admin)))
}
