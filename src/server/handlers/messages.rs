use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::messaging::{
    self, ConversationView, InboxEntry, MessageView, NewMessage, ReactionSummary, DEFAULT_THREAD_LIMIT,
};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ThreadQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MessageEdit {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

/// GET /messages/inbox
pub async fn inbox(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<InboxEntry>>> {
    Ok(Json(messaging::inbox(&state.db, &caller.user)?))
}

/// GET /messages/unread-count
pub async fn unread_count(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Value>> {
    let unread = messaging::unread_count(&state.db, &caller.user)?;
    Ok(Json(json!({ "unread": unread })))
}

/// GET /messages/with/:user_id?limit=
pub async fn thread(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
    Query(query): Query<ThreadQuery>,
) -> AppResult<Json<ConversationView>> {
    let limit = query.limit.unwrap_or(DEFAULT_THREAD_LIMIT);
    Ok(Json(messaging::open_conversation(&state.db, &caller.user, &user_id, limit)?))
}

/// POST /messages/with/:user_id
pub async fn send(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
    Json(input): Json<NewMessage>,
) -> AppResult<impl IntoResponse> {
    let message = messaging::send_message(&state.db, &caller.user, &user_id, input)?;
    Ok((StatusCode::CREATED, Json(MessageView::new(&message, &caller.user.id))))
}

/// PATCH /messages/:id
pub async fn edit(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(edit): Json<MessageEdit>,
) -> AppResult<Json<MessageView>> {
    let message = messaging::edit_message(&state.db, &caller.user, &id, &edit.body)?;
    Ok(Json(MessageView::new(&message, &caller.user.id)))
}

/// DELETE /messages/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    messaging::delete_message(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /messages/:id/reactions
pub async fn react(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(reaction): Json<ReactionRequest>,
) -> AppResult<Json<Vec<ReactionSummary>>> {
    Ok(Json(messaging::toggle_reaction(&state.db, &caller.user, &id, &reaction.emoji)?))
}
