use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde_json::json;
use tracing::{info, warn};

use giftlist_crypto::PasswordDigest;
use giftlist_db::{Database, User};
use giftlist_types::api::{
    ErrorCode, LoginRequest, LoginResponse, LogoutRequest, SessionResponse, UserInfo,
};
use giftlist_types::clock::Clock;

use crate::blocking;
use crate::error::ApiError;
use crate::sessions::{ActiveSession, SessionManager};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionManager,
    pub clock: Arc<dyn Clock>,
    pub passwords: Arc<dyn PasswordDigest>,
}

pub(crate) fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user.id,
        username: user.username.clone(),
        fullname: user.fullname.clone(),
        is_admin: user.admin,
    }
}

fn bad_credentials() -> ApiError {
    ApiError::new(ErrorCode::PermissionDenied, "invalid user/password")
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::new(
            ErrorCode::InvalidArgument,
            "username and password required",
        ));
    }

    let now = state.clock.now();
    let st = state.clone();
    let username = req.username.clone();
    let (user, token, expiry) = blocking(move || {
        let (user, digest) = st
            .db
            .get_user_credentials(&req.username)?
            .ok_or_else(bad_credentials)?;

        if !st.passwords.verify(&req.password, &digest)? {
            return Err(bad_credentials());
        }

        let (token, expiry) = st.sessions.create_session(&user, now)?;
        Ok((user, token, expiry))
    })
    .await
    .inspect_err(|e| {
        if e.code == ErrorCode::PermissionDenied {
            warn!("Failed login for {}", username);
        }
    })?;

    info!("User {} logged in, session expires {}", user.username, expiry);
    Ok(Json(LoginResponse {
        token,
        expiry,
        user: user_info(&user),
    }))
}

/// Always succeeds. The token comes from the JSON body, or from the
/// `Authorization` header when the body is empty or carries none. Failures to
/// revoke are logged and otherwise ignored.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice::<LogoutRequest>(&body).unwrap_or_else(|e| {
            warn!("Ignoring unreadable logout body: {}", e);
            LogoutRequest::default()
        })
    };

    let token = if req.token.trim().is_empty() {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().strip_prefix("Bearer ").unwrap_or(v.trim()).to_string())
            .unwrap_or_default()
    } else {
        req.token.trim().to_string()
    };

    let st = state.clone();
    match blocking(move || Ok(st.sessions.deactivate_session(&token))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Logout failure: {}", e),
        Err(e) => warn!("Logout failure: {}", e),
    }
    Json(json!({}))
}

pub async fn current_session(Extension(active): Extension<ActiveSession>) -> impl IntoResponse {
    Json(SessionResponse {
        user: user_info(&active.user),
        expiry: active.session.expiry,
    })
}
