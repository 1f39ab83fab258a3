//! Prometheus metrics endpoint.
//!
//! Serves the checkout and order lifecycle counters (`checkout_total`,
//! `orders_paid_total`, `orders_cancelled_total`,
//! `cart_promo_applied_total`) and the checkout duration histogram.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — renders the recorder in Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
