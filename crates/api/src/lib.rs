//! HTTP API server with observability for the storefront.
//!
//! Provides REST endpoints for the catalog, carts, checkout, and order
//! lifecycle, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{CartService, CheckoutService, OrderService, PricingConfig, SessionService};
use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the shared application state over the given store.
pub fn create_state<S: Store>(store: Arc<S>, config: &Config) -> Arc<AppState<S>> {
    let pricing = PricingConfig {
        tax_rate: config.tax_rate,
        tax_enabled: config.tax_enabled,
    };
    Arc::new(AppState {
        carts: CartService::new(store.clone(), pricing),
        checkout: CheckoutService::new(store.clone(), pricing),
        orders: OrderService::new(store.clone()),
        sessions: SessionService::new(store, Duration::hours(config.session_ttl_hours)),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/sessions", post(routes::sessions::create::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route("/cart/items", delete(routes::cart::clear::<S>))
        .route("/cart/items/{product_id}", put(routes::cart::update_item::<S>))
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/promo", post(routes::cart::apply_promo::<S>))
        .route("/cart/promo", delete(routes::cart::remove_promo::<S>))
        .route("/checkout", post(routes::checkout::post::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/pay", post(routes::orders::pay::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
