use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::server::AppState;
use crate::tutoring::{self, NewRequest, RequestAction, TutorRequest};

/// GET /tutor-requests
pub async fn list_requests(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<TutorRequest>>> {
    Ok(Json(tutoring::list_requests(&state.db, &caller.user)?))
}

/// POST /tutor-requests
pub async fn create_request(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<NewRequest>,
) -> AppResult<impl IntoResponse> {
    let request = tutoring::create_request(&state.db, &state.notifier, &caller.user, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn apply(state: &AppState, caller: &AuthUser, id: &str, action: RequestAction) -> AppResult<Json<TutorRequest>> {
    let request = tutoring::transition(&state.db, &state.notifier, &caller.user, id, action).await?;
    Ok(Json(request))
}

/// POST /tutor-requests/:id/accept
pub async fn accept(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TutorRequest>> {
    apply(&state, &caller, &id, RequestAction::Accept).await
}

/// POST /tutor-requests/:id/decline
pub async fn decline(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TutorRequest>> {
    apply(&state, &caller, &id, RequestAction::Decline).await
}

/// POST /tutor-requests/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TutorRequest>> {
    apply(&state, &caller, &id, RequestAction::Complete).await
}

/// POST /tutor-requests/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TutorRequest>> {
    apply(&state, &caller, &id, RequestAction::Cancel).await
}
