use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::catalog::{self, Module, NewModule};
use crate::error::{AppError, AppResult};
use crate::server::AppState;
use crate::topics::{self, NewTopic, TopicStatus, TopicView};

#[derive(Debug, Default, Deserialize)]
pub struct TopicFilter {
    pub status: Option<TopicStatus>,
}

/// GET /modules
pub async fn list_modules(State(state): State<AppState>, _caller: AuthUser) -> AppResult<Json<Vec<Module>>> {
    Ok(Json(state.db.list_modules()?))
}

/// POST /modules
pub async fn create_module(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<NewModule>,
) -> AppResult<impl IntoResponse> {
    let module = catalog::create_module(&state.db, &caller.user, input)?;
    tracing::info!(module_id = %module.id, code = %module.code, "module created");
    Ok((StatusCode::CREATED, Json(module)))
}

/// GET /modules/:id
pub async fn get_module(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Module>> {
    let module = state
        .db
        .find_module(&id)?
        .ok_or_else(|| AppError::not_found("module"))?;
    Ok(Json(module))
}

/// GET /modules/:id/topics?status=
pub async fn list_topics(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Query(filter): Query<TopicFilter>,
) -> AppResult<Json<Vec<TopicView>>> {
    Ok(Json(topics::list_topics(&state.db, &id, filter.status, Some(&caller.user))?))
}

/// POST /modules/:id/topics
pub async fn create_topic(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<NewTopic>,
) -> AppResult<impl IntoResponse> {
    let topic = topics::create_topic(&state.db, &caller.user, &id, input)?;
    Ok((StatusCode::CREATED, Json(topic)))
}
