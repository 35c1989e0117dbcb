use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use giftlist_types::api::ErrorCode;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// Resolve the `Authorization` token to an active session and hand it to the
/// handler as `Extension<ActiveSession>`.
///
/// The token may be sent raw or with a `Bearer ` prefix.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "no auth token found"))?;

    let malformed = || ApiError::new(ErrorCode::InvalidArgument, "malformed session token");
    let raw = value.to_str().map_err(|_| malformed())?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        return Err(ApiError::new(ErrorCode::Unauthenticated, "no auth token found"));
    }

    let Some(session_id) = state.sessions.session_id_from_token(token) else {
        warn!("Rejected malformed session token");
        return Err(malformed());
    };

    let now = state.clock.now();
    let st = state.clone();
    let active = blocking(move || Ok(st.sessions.lookup_active_session(session_id, now)?))
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "no active session"))?;

    req.extensions_mut().insert(active);
    Ok(next.run(req).await)
}
