use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthUser, ProfileUpdate, PublicProfile, Registration, Role, User};
use crate::catalog::{self, Module};
use crate::error::{AppError, AppResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// The caller's own account. Tutors also see the modules they teach.
#[derive(Debug, Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teaching_module_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct TeachingModules {
    pub module_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TutorFilter {
    pub module_id: Option<String>,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> AppResult<impl IntoResponse> {
    let user = auth::register(&state.db, registration)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let session = auth::login(
        &state.db,
        &request.email,
        &request.password,
        state.config.session_ttl_hours,
    )?;
    let user = state
        .db
        .find_user(&session.user_id)?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, caller: AuthUser) -> AppResult<StatusCode> {
    auth::logout(&state.db, &caller.token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /me
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Me>> {
    let teaching_module_ids = match caller.user.role {
        Role::Tutor => Some(state.db.tutor_module_ids(&caller.user.id)?),
        _ => None,
    };
    Ok(Json(Me {
        user: caller.user,
        teaching_module_ids,
    }))
}

/// PATCH /me
pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<User>> {
    Ok(Json(auth::update_profile(&state.db, &caller.user, update)?))
}

/// PUT /me/modules
pub async fn set_my_modules(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<TeachingModules>,
) -> AppResult<Json<Vec<Module>>> {
    Ok(Json(catalog::set_teaching(&state.db, &caller.user, &input.module_ids)?))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PublicProfile>> {
    let user = state
        .db
        .find_user(&id)?
        .ok_or_else(|| AppError::not_found("user"))?;
    Ok(Json(user.profile()))
}

/// GET /tutors?module_id=
pub async fn list_tutors(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(filter): Query<TutorFilter>,
) -> AppResult<Json<Vec<PublicProfile>>> {
    let tutors = state.db.list_tutors(filter.module_id.as_deref())?;
    Ok(Json(tutors.iter().map(User::profile).collect()))
}
