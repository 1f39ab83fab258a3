//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use checkout::CheckoutRequest;
use common::PaymentMethodId;
use serde::Deserialize;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::identify;
use crate::routes::AppState;
use crate::routes::orders::OrderResponse;

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method_id: Uuid,
}

/// POST /checkout — places an order from the caller's cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn post<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let identity = identify(&state, &headers).await?;
    let owner = state
        .carts
        .resolve_owner(identity.user_id, identity.session_id)
        .await?;

    let (order, items) = state
        .checkout
        .checkout(
            owner,
            CheckoutRequest {
                shipping_address: req.shipping_address,
                billing_address: req.billing_address,
                payment_method_id: PaymentMethodId::from_uuid(req.payment_method_id),
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_parts(order, items)),
    ))
}
