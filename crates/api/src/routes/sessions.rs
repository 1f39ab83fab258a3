//! Guest session endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    /// Returned exactly once; present it in `x-session-secret` afterwards.
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /sessions — issues a new guest session.
#[tracing::instrument(skip(state))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.sessions.create().await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id.to_string(),
            secret: session.secret,
            expires_at: session.expires_at,
        }),
    ))
}
