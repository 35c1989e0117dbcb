pub mod auth;
pub mod error;
pub mod items;
pub mod lists;
pub mod middleware;
pub mod sessions;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

/// All routes. Everything except login and logout sits behind the session
/// gate.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/session", get(auth::current_session))
        .route("/lists", get(lists::list_lists).post(lists::create_list))
        .route("/lists/{list_id}", get(lists::get_list).patch(lists::update_list))
        .route("/lists/{list_id}/active", post(lists::change_list_active_state))
        .route(
            "/lists/{list_id}/items",
            get(items::list_list_items).post(items::create_list_item),
        )
        .route(
            "/lists/{list_id}/items/{item_id}",
            patch(items::update_list_item).delete(items::delete_list_item),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::internal()
    })?
}
