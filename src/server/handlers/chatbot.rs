use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthUser;
use crate::chatbot::{self, Conversation, ConversationDetail, Exchange, NewConversation, Question};
use crate::error::AppResult;
use crate::server::AppState;
use crate::tutoring::{self, Escalation};

/// GET /chatbot/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(state.db.list_conversations(&caller.user.id)?))
}

/// POST /chatbot/conversations
pub async fn start_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    input: Option<Json<NewConversation>>,
) -> AppResult<impl IntoResponse> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let conversation = chatbot::start_conversation(&state.db, &caller.user, input)?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /chatbot/conversations/:id
pub async fn get_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ConversationDetail>> {
    Ok(Json(chatbot::conversation_detail(&state.db, &caller.user, &id)?))
}

/// POST /chatbot/conversations/:id/messages
pub async fn ask(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(question): Json<Question>,
) -> AppResult<Json<Exchange>> {
    let exchange = chatbot::ask(
        &state.db,
        state.completion.as_ref(),
        state.config.chatbot.max_history,
        &caller.user,
        &id,
        &question.content,
    )
    .await?;
    Ok(Json(exchange))
}

/// POST /chatbot/conversations/:id/escalate
pub async fn escalate(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    input: Option<Json<Escalation>>,
) -> AppResult<impl IntoResponse> {
    let escalation = input.map(|Json(input)| input).unwrap_or_default();
    let request = tutoring::escalate(&state.db, &state.notifier, &caller.user, &id, escalation).await?;
    Ok((StatusCode::CREATED, Json(request)))
}
