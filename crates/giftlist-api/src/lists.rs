use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use giftlist_db::{List, ListData, ListFilter, ListPatch, Update};
use giftlist_types::ListId;
use giftlist_types::api::{
    ChangeActiveStateRequest, CreateListRequest, ErrorCode, ListListsQuery, ListResponse,
    UpdateListRequest,
};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::sessions::ActiveSession;

pub(crate) fn list_response(list: List) -> ListResponse {
    ListResponse {
        id: list.id,
        version: list.version,
        owner_id: list.owner_id,
        name: list.data.name,
        beneficiary: list.data.beneficiary,
        event_date: list.data.event_date,
        active: list.data.active,
        created: list.created,
        updated: list.updated,
    }
}

/// Every user can see every list; inactive ones only on request.
pub async fn list_lists(
    State(state): State<AppState>,
    Extension(_active): Extension<ActiveSession>,
    Query(query): Query<ListListsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ListFilter::include_inactive(query.include_inactive);
    let st = state.clone();
    let lists = blocking(move || Ok(st.db.list_lists(filter)?)).await?;
    Ok(Json(lists.into_iter().map(list_response).collect::<Vec<_>>()))
}

pub async fn get_list(
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Extension(_active): Extension<ActiveSession>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let list = blocking(move || Ok(st.db.get_list(list_id)?))
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("no list {}", list_id)))?;
    Ok(Json(list_response(list)))
}

pub async fn create_list(
    State(state): State<AppState>,
    Extension(active): Extension<ActiveSession>,
    Json(req): Json<CreateListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let data = ListData {
        name: req.name,
        beneficiary: req.beneficiary,
        event_date: req.event_date,
        active: req.active,
    };
    let owner = active.user.id;
    let now = state.clock.now();

    let st = state.clone();
    let list = blocking(move || Ok(st.db.create_list(owner, &data, now)?)).await?;

    info!("User {} created list {}", active.user.username, list.id);
    Ok((StatusCode::CREATED, Json(list_response(list))))
}

pub async fn update_list(
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Extension(active): Extension<ActiveSession>,
    Json(req): Json<UpdateListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update {
        expected_version: req.version,
        actor: active.user.id,
        now: state.clock.now(),
        patch: ListPatch::Data(req.data),
    };
    apply(state, list_id, update).await
}

pub async fn change_list_active_state(
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Extension(active): Extension<ActiveSession>,
    Json(req): Json<ChangeActiveStateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update {
        expected_version: req.version,
        actor: active.user.id,
        now: state.clock.now(),
        patch: ListPatch::Active(req.active),
    };
    apply(state, list_id, update).await
}

async fn apply(
    state: AppState,
    list_id: ListId,
    update: Update<ListPatch>,
) -> Result<Json<ListResponse>, ApiError> {
    let list = blocking(move || Ok(state.db.update_list(list_id, update)?)).await?;
    Ok(Json(list_response(list)))
}
