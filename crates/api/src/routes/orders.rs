//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::Viewer;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentMethodId};
use domain::{Order, OrderItem};
use serde::{Deserialize, Serialize};
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::{Identity, identify};
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PayRequest {
    pub payment_method_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub promo_code: Option<String>,
    pub tax_cents: i64,
    pub tax_rate: f64,
    pub total_cents: i64,
    pub payment_method_id: String,
    pub order_date: DateTime<Utc>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_parts(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status.as_str().to_string(),
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            subtotal_cents: order.subtotal.cents(),
            discount_cents: order.discount.cents(),
            promo_code: order.promo.map(|p| p.code),
            tax_cents: order.tax.cents(),
            tax_rate: order.tax_rate,
            total_cents: order.total.cents(),
            payment_method_id: order.payment_method_id.to_string(),
            order_date: order.order_date,
            shipped_date: order.shipped_date,
            delivered_date: order.delivered_date,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.line_total().cents(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub status: String,
    pub total_cents: i64,
    pub order_date: DateTime<Utc>,
}

fn viewer_for(identity: &Identity) -> Result<Viewer, ApiError> {
    if identity.is_admin {
        Ok(Viewer::admin())
    } else {
        Ok(Viewer::owner(identity.require_owner()?))
    }
}

// -- Handlers --

/// GET /orders — lists the caller's orders, newest first.
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let owner = identity.require_owner()?;
    let orders = state.orders.list(owner).await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|order| OrderSummaryResponse {
                id: order.id.to_string(),
                status: order.status.as_str().to_string(),
                total_cents: order.total.cents(),
                order_date: order.order_date,
            })
            .collect(),
    ))
}

/// GET /orders/{id} — loads an order visible to the caller.
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let viewer = viewer_for(&identity)?;
    let (order, items) = state.orders.get(viewer, OrderId::from_uuid(id)).await?;
    Ok(Json(OrderResponse::from_parts(order, items)))
}

/// POST /orders/{id}/pay — pays a pending order.
#[tracing::instrument(skip(state, headers, req))]
pub async fn pay<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let viewer = viewer_for(&identity)?;
    let (order, items) = state
        .orders
        .pay(
            viewer,
            OrderId::from_uuid(id),
            PaymentMethodId::from_uuid(req.payment_method_id),
        )
        .await?;
    Ok(Json(OrderResponse::from_parts(order, items)))
}

/// POST /orders/{id}/cancel — cancels a cancellable order.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let identity = identify(&state, &headers).await?;
    let viewer = viewer_for(&identity)?;
    let (order, items) = state.orders.cancel(viewer, OrderId::from_uuid(id)).await?;
    Ok(Json(OrderResponse::from_parts(order, items)))
}

/// PUT /orders/{id}/status — admin status update.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let identity = identify(&state, &headers).await?;
    identity.require_admin()?;
    let (order, items) = state
        .orders
        .update_status(OrderId::from_uuid(id), &req.status)
        .await?;
    Ok(Json(OrderResponse::from_parts(order, items)))
}
