use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::notifications::{self, Notification};
use crate::server::AppState;

/// GET /notifications
pub async fn list(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.db.list_notifications(&caller.user.id)?))
}

/// POST /notifications/:id/read
///
/// Reading an already-read notification is fine; someone else's is not found.
pub async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    notifications::mark_read(&state.db, &caller.user, &id)?;
    Ok(Json(json!({ "read": true })))
}

/// POST /notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Value>> {
    let marked = state.db.mark_all_notifications_read(&caller.user.id)?;
    Ok(Json(json!({ "marked": marked })))
}
