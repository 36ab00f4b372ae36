//! Requests for help from a human tutor.
//!
//! Requests are opened directly by students or by escalating a chatbot
//! conversation. Their lifecycle is a small state machine:
//!
//! ```text
//! pending ──accept──▶ accepted ──complete──▶ completed
//!    │                   │
//!    ├──decline──▶ declined
//!    └──cancel───▶ cancelled ◀──cancel──┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::chatbot::{self, ChatRole};
use crate::error::{AppError, AppResult};
use crate::notifications::{NotificationKind, Notifier};
use crate::store::Db;

/// User turns quoted in an escalation when no details are given.
const TRANSCRIPT_TURNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self -> next` is a legal move.
    pub fn can_move_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Accepted, Completed)
                | (Accepted, Cancelled)
        )
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "declined" => Ok(RequestStatus::Declined),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorRequest {
    pub id: String,
    pub student_id: String,
    pub tutor_id: Option<String>,
    pub module_id: Option<String>,
    /// Chatbot conversation this request was escalated from.
    pub conversation_id: Option<String>,
    pub subject: String,
    pub details: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub subject: String,
    #[serde(default)]
    pub details: String,
    pub module_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Escalation {
    pub details: Option<String>,
}

/// What a user is trying to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Decline,
    Complete,
    Cancel,
}

impl RequestAction {
    fn target(self) -> RequestStatus {
        match self {
            RequestAction::Accept => RequestStatus::Accepted,
            RequestAction::Decline => RequestStatus::Declined,
            RequestAction::Complete => RequestStatus::Completed,
            RequestAction::Cancel => RequestStatus::Cancelled,
        }
    }
}

fn load_request(db: &Db, request_id: &str) -> AppResult<TutorRequest> {
    db.find_tutor_request(request_id)?
        .ok_or_else(|| AppError::not_found("tutor request"))
}

/// Tell the tutors of the request's module about it. Failures are logged.
async fn announce_request(db: &Db, notifier: &Notifier, request: &TutorRequest) {
    tracing::info!(request_id = %request.id, module_id = ?request.module_id, "tutor request opened");
    let tutors = match db.list_tutors(request.module_id.as_deref()) {
        Ok(tutors) => tutors,
        Err(err) => {
            tracing::warn!(request_id = %request.id, error = %err, "could not load tutors to notify");
            return;
        }
    };
    let message = format!("A student needs help: \"{}\".", request.subject);
    notifier
        .notify_all(
            &tutors,
            None,
            NotificationKind::TutorRequest,
            &message,
            Some(&format!("/tutor-requests/{}", request.id)),
        )
        .await;
}

/// Open a request directly.
pub async fn create_request(
    db: &Db,
    notifier: &Notifier,
    student: &User,
    input: NewRequest,
) -> AppResult<TutorRequest> {
    if student.role != Role::Student {
        return Err(AppError::forbidden("only students can request a tutor"));
    }
    if let Some(module_id) = &input.module_id {
        db.find_module(module_id)?
            .ok_or_else(|| AppError::not_found("module"))?;
    }
    let now = Utc::now();
    let request = TutorRequest {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        tutor_id: None,
        module_id: input.module_id,
        conversation_id: None,
        subject: crate::validate::title(&input.subject)?,
        details: input.details.trim().to_string(),
        status: RequestStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    db.insert_tutor_request(&request)?;
    announce_request(db, notifier, &request).await;
    Ok(request)
}

/// Promote a chatbot conversation to a tutor request.
pub async fn escalate(
    db: &Db,
    notifier: &Notifier,
    student: &User,
    conversation_id: &str,
    escalation: Escalation,
) -> AppResult<TutorRequest> {
    let conversation = chatbot::owned_conversation(db, student, conversation_id)?;
    if conversation.escalated_request_id.is_some() {
        return Err(AppError::conflict("conversation already escalated"));
    }

    let details = match escalation.details.map(|d| d.trim().to_string()) {
        Some(d) if !d.is_empty() => d,
        _ => transcript(&db.chat_messages(conversation_id)?),
    };
    let now = Utc::now();
    let request = TutorRequest {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        tutor_id: None,
        module_id: conversation.module_id.clone(),
        conversation_id: Some(conversation.id.clone()),
        subject: conversation.title.clone(),
        details,
        status: RequestStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    if !db.insert_escalated_request(&conversation.id, &request)? {
        return Err(AppError::conflict("conversation already escalated"));
    }
    announce_request(db, notifier, &request).await;
    Ok(request)
}

/// The last few student turns, oldest first.
fn transcript(messages: &[chatbot::ChatMessage]) -> String {
    let questions: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .collect();
    let start = questions.len().saturating_sub(TRANSCRIPT_TURNS);
    questions[start..]
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply `action` to a request on behalf of `actor`.
pub async fn transition(
    db: &Db,
    notifier: &Notifier,
    actor: &User,
    request_id: &str,
    action: RequestAction,
) -> AppResult<TutorRequest> {
    let mut request = load_request(db, request_id)?;

    match action {
        RequestAction::Accept | RequestAction::Decline => {
            if !actor.is_tutor() {
                return Err(AppError::forbidden("only tutors can accept or decline requests"));
            }
        }
        RequestAction::Complete => {
            if request.tutor_id.as_deref() != Some(actor.id.as_str()) {
                return Err(AppError::forbidden("only the assigned tutor can complete a request"));
            }
        }
        RequestAction::Cancel => {
            if request.student_id != actor.id {
                return Err(AppError::forbidden("only the requesting student can cancel"));
            }
        }
    }

    let next = action.target();
    if !request.status.can_move_to(next) {
        return Err(AppError::conflict(format!(
            "cannot move a {} request to {}",
            request.status, next
        )));
    }
    if action == RequestAction::Accept {
        request.tutor_id = Some(actor.id.clone());
    }
    request.status = next;
    request.updated_at = Utc::now();
    db.update_tutor_request(&request)?;
    tracing::info!(request_id, status = %next, actor = %actor.id, "tutor request updated");

    if actor.id != request.student_id {
        if let Some(student) = db.find_user(&request.student_id)? {
            let message = format!(
                "{} {} your request \"{}\".",
                actor.display_name, next, request.subject
            );
            let sent = notifier
                .notify(
                    &student,
                    NotificationKind::RequestUpdate,
                    &message,
                    Some(&format!("/tutor-requests/{}", request.id)),
                )
                .await;
            if let Err(err) = sent {
                tracing::warn!(request_id, error = %err, "could not notify student");
            }
        }
    }
    Ok(request)
}

/// Requests visible to `user`.
pub fn list_requests(db: &Db, user: &User) -> AppResult<Vec<TutorRequest>> {
    match user.role {
        Role::Student => db.requests_for_student(&user.id),
        Role::Tutor => db.requests_for_tutor(&user.id),
        Role::Admin => db.all_tutor_requests(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::{ask, start_conversation, NewConversation};
    use crate::catalog::set_teaching;
    use crate::testing::{seed_user, ScriptedCompletion, TestWorld};

    fn new_request(world: &TestWorld) -> NewRequest {
        NewRequest {
            subject: "Dynamic programming".into(),
            details: "I don't get memoisation.".into(),
            module_id: Some(world.module.id.clone()),
        }
    }

    #[test]
    fn test_state_machine() {
        use RequestStatus::*;
        assert!(Pending.can_move_to(Accepted));
        assert!(Pending.can_move_to(Cancelled));
        assert!(Accepted.can_move_to(Completed));
        assert!(!Pending.can_move_to(Completed));
        assert!(!Completed.can_move_to(Cancelled));
        assert!(!Declined.can_move_to(Accepted));
    }

    #[tokio::test]
    async fn test_full_lifecycle_notifies_student() {
        let world = TestWorld::new();
        set_teaching(&world.db, &world.tutor, &[world.module.id.clone()]).unwrap();

        let request = create_request(&world.db, &world.notifier, &world.student, new_request(&world))
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(world.db.list_notifications(&world.tutor.id).unwrap().len(), 1);

        let accepted = transition(&world.db, &world.notifier, &world.tutor, &request.id, RequestAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.tutor_id.as_deref(), Some(world.tutor.id.as_str()));

        let done = transition(&world.db, &world.notifier, &world.tutor, &request.id, RequestAction::Complete)
            .await
            .unwrap();
        assert_eq!(done.status, RequestStatus::Completed);

        let notes = world.db.list_notifications(&world.student.id).unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.kind == NotificationKind::RequestUpdate));
    }

    #[tokio::test]
    async fn test_permissions_and_illegal_moves() {
        let world = TestWorld::new();
        let other_tutor = seed_user(&world.db, "otto", Role::Tutor);
        let request = create_request(&world.db, &world.notifier, &world.student, new_request(&world))
            .await
            .unwrap();

        let err = transition(&world.db, &world.notifier, &world.student, &request.id, RequestAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = transition(&world.db, &world.notifier, &world.tutor, &request.id, RequestAction::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        transition(&world.db, &world.notifier, &world.tutor, &request.id, RequestAction::Accept)
            .await
            .unwrap();
        let err = transition(&world.db, &world.notifier, &other_tutor, &request.id, RequestAction::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = transition(&world.db, &world.notifier, &other_tutor, &request.id, RequestAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        transition(&world.db, &world.notifier, &world.student, &request.id, RequestAction::Cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_only_students_open_requests() {
        let world = TestWorld::new();
        let err = create_request(&world.db, &world.notifier, &world.tutor, new_request(&world))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_escalation_builds_transcript_once() {
        let world = TestWorld::new();
        let client = ScriptedCompletion::replying("Have you tried a table?");
        let conversation = start_conversation(
            &world.db,
            &world.student,
            NewConversation { module_id: Some(world.module.id.clone()) },
        )
        .unwrap();
        for q in ["What is DP?", "Why memoise?", "Show knapsack", "Still lost"] {
            ask(&world.db, &client, 20, &world.student, &conversation.id, q).await.unwrap();
        }

        let request = escalate(&world.db, &world.notifier, &world.student, &conversation.id, Escalation::default())
            .await
            .unwrap();
        assert_eq!(request.subject, "What is DP?");
        assert_eq!(request.module_id.as_deref(), Some(world.module.id.as_str()));
        assert_eq!(request.conversation_id.as_deref(), Some(conversation.id.as_str()));
        assert_eq!(request.details, "- Why memoise?\n- Show knapsack\n- Still lost");

        let stored = world.db.find_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(stored.escalated_request_id.as_deref(), Some(request.id.as_str()));

        let err = escalate(&world.db, &world.notifier, &world.student, &conversation.id, Escalation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_escalation_leaves_conversation_unlinked() {
        let world = TestWorld::new();
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();
        world
            .db
            .with_conn(|conn| conn.execute_batch("DROP TABLE tutor_requests"))
            .unwrap();

        let err = escalate(&world.db, &world.notifier, &world.student, &conversation.id, Escalation::default())
            .await
            .unwrap_err();
        assert!(!matches!(err, AppError::Conflict(_)));

        let stored = world.db.find_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(stored.escalated_request_id, None);
    }

    #[tokio::test]
    async fn test_escalation_with_details() {
        let world = TestWorld::new();
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();
        let request = escalate(
            &world.db,
            &world.notifier,
            &world.student,
            &conversation.id,
            Escalation { details: Some("Need a session before Friday".into()) },
        )
        .await
        .unwrap();
        assert_eq!(request.details, "Need a session before Friday");
        assert_eq!(request.module_id, None);
    }

    #[tokio::test]
    async fn test_listing_by_role() {
        let world = TestWorld::new();
        let outsider = seed_user(&world.db, "otto", Role::Tutor);
        let other_module = crate::testing::seed_module(&world.db, "MATH1001");
        set_teaching(&world.db, &world.tutor, &[world.module.id.clone()]).unwrap();
        set_teaching(&world.db, &outsider, &[other_module.id.clone()]).unwrap();

        let request = create_request(&world.db, &world.notifier, &world.student, new_request(&world))
            .await
            .unwrap();

        assert_eq!(list_requests(&world.db, &world.student).unwrap().len(), 1);
        assert_eq!(list_requests(&world.db, &world.tutor).unwrap().len(), 1);
        assert!(list_requests(&world.db, &outsider).unwrap().is_empty());
        assert_eq!(list_requests(&world.db, &world.admin).unwrap().len(), 1);

        transition(&world.db, &world.notifier, &world.tutor, &request.id, RequestAction::Accept)
            .await
            .unwrap();
        // Still visible to the assigned tutor once no longer pending.
        assert_eq!(list_requests(&world.db, &world.tutor).unwrap().len(), 1);
    }
}
