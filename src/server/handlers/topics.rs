use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::server::AppState;
use crate::topics::{self, NewReply, Reply, Topic, TopicDetail, TopicUpdate, TopicView};
use crate::voting::{VoteTally, VoteValue};

#[derive(Debug, Deserialize)]
pub struct ReplyEdit {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: VoteValue,
}

/// GET /topics/:id
pub async fn get_topic(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TopicDetail>> {
    Ok(Json(topics::topic_detail(&state.db, &id, Some(&caller.user))?))
}

/// PATCH /topics/:id
pub async fn update_topic(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<TopicUpdate>,
) -> AppResult<Json<Topic>> {
    Ok(Json(topics::update_topic(&state.db, &caller.user, &id, update)?))
}

/// DELETE /topics/:id
pub async fn delete_topic(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    topics::delete_topic(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /topics/:id/replies
pub async fn create_reply(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<NewReply>,
) -> AppResult<impl IntoResponse> {
    let reply = topics::create_reply(&state.db, &state.notifier, &caller.user, &id, input).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// POST /topics/:id/accept/:reply_id
pub async fn accept_reply(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, reply_id)): Path<(String, String)>,
) -> AppResult<Json<Topic>> {
    let topic = topics::accept_reply(&state.db, &state.notifier, &caller.user, &id, &reply_id).await?;
    Ok(Json(topic))
}

/// POST /topics/:id/subscription
pub async fn subscribe(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    topics::subscribe(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /topics/:id/subscription
pub async fn unsubscribe(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    topics::unsubscribe(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /me/subscriptions
pub async fn my_subscriptions(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<TopicView>>> {
    Ok(Json(topics::subscriptions(&state.db, &caller.user)?))
}

/// PATCH /replies/:id
pub async fn update_reply(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(edit): Json<ReplyEdit>,
) -> AppResult<Json<Reply>> {
    Ok(Json(topics::update_reply(&state.db, &caller.user, &id, &edit.body)?))
}

/// DELETE /replies/:id
pub async fn delete_reply(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    topics::delete_reply(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /replies/:id/vote
pub async fn vote_reply(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(vote): Json<VoteRequest>,
) -> AppResult<Json<VoteTally>> {
    Ok(Json(topics::vote_reply(&state.db, &caller.user, &id, vote.value)?))
}
