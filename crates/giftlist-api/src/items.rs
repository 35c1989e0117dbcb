use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use giftlist_db::{ClaimChange, ItemPatch, ListItem, ListItemData, Update};
use giftlist_types::api::{CreateListItemRequest, ListItemResponse, UpdateListItemRequest};
use giftlist_types::{ItemId, ListId};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::sessions::ActiveSession;

pub(crate) fn item_response(item: ListItem) -> ListItemResponse {
    ListItemResponse {
        id: item.id,
        version: item.version,
        list_id: item.list_id,
        claimed_by: item.claim.claimant(),
        claimed_when: item.claim.claimed_when(),
        name: item.data.name,
        desc: item.data.desc,
        url: item.data.url,
        created: item.created,
        updated: item.updated,
    }
}

pub async fn list_list_items(
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Extension(_active): Extension<ActiveSession>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let items = blocking(move || Ok(st.db.list_list_items(list_id)?)).await?;
    Ok(Json(items.into_iter().map(item_response).collect::<Vec<_>>()))
}

pub async fn create_list_item(
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Extension(active): Extension<ActiveSession>,
    Json(req): Json<CreateListItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let data = ListItemData {
        name: req.name,
        desc: req.desc,
        url: req.url,
    };
    let actor = active.user.id;
    let now = state.clock.now();

    let st = state.clone();
    let item = blocking(move || Ok(st.db.create_list_item(list_id, actor, &data, now)?)).await?;

    info!("User {} added item {} to list {}", active.user.username, item.id, list_id);
    Ok((StatusCode::CREATED, Json(item_response(item))))
}

pub async fn delete_list_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(ListId, ItemId)>,
    Extension(active): Extension<ActiveSession>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = active.user.id;
    let st = state.clone();
    blocking(move || Ok(st.db.delete_list_item(list_id, item_id, actor)?)).await?;

    info!("User {} deleted item {} from list {}", active.user.username, item_id, list_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Data edits are for the list owner; `state.claimed` claims or releases the
/// item for the caller. Both may be sent together.
pub async fn update_list_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(ListId, ItemId)>,
    Extension(active): Extension<ActiveSession>,
    Json(req): Json<UpdateListItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update {
        expected_version: req.version,
        actor: active.user.id,
        now: state.clock.now(),
        patch: ItemPatch {
            data: req.data,
            claim: req.state.map(|s| ClaimChange::from_claimed(s.claimed)),
        },
    };

    let st = state.clone();
    let item = blocking(move || Ok(st.db.update_list_item(list_id, item_id, update)?)).await?;
    Ok(Json(item_response(item)))
}
