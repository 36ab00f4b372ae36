use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::forum::{self, ForumPost, NewComment, NewPost, PostDetail, PostSort, PostUpdate, PostView};
use crate::server::AppState;
use crate::voting::VoteTally;

use super::topics::VoteRequest;

#[derive(Debug, Default, Deserialize)]
pub struct PostListing {
    #[serde(default)]
    pub sort: PostSort,
}

/// GET /forum/posts?sort=new|top
pub async fn list_posts(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(listing): Query<PostListing>,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(forum::list_posts(&state.db, listing.sort, Some(&caller.user))?))
}

/// POST /forum/posts
pub async fn create_post(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<NewPost>,
) -> AppResult<impl IntoResponse> {
    let post = forum::create_post(&state.db, &caller.user, input)?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /forum/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostDetail>> {
    Ok(Json(forum::post_detail(&state.db, &id, Some(&caller.user))?))
}

/// PATCH /forum/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<PostUpdate>,
) -> AppResult<Json<ForumPost>> {
    Ok(Json(forum::update_post(&state.db, &caller.user, &id, update)?))
}

/// DELETE /forum/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    forum::delete_post(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /forum/posts/:id/vote
pub async fn vote_post(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(vote): Json<VoteRequest>,
) -> AppResult<Json<VoteTally>> {
    Ok(Json(forum::vote_post(&state.db, &caller.user, &id, vote.value)?))
}

/// POST /forum/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<NewComment>,
) -> AppResult<impl IntoResponse> {
    let comment = forum::create_comment(&state.db, &caller.user, &id, input)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /forum/comments/:id
pub async fn delete_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    forum::delete_comment(&state.db, &caller.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
