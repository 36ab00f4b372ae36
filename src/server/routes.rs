//! Router assembly and the liveness probe.
//!
//! # Routes
//!
//! - `GET  /health` returns `{"status": "ok", "version": ..., "service": "tutorhub"}`
//! - `/auth/*`, `/me`, `/users/:id`, `/tutors` accounts and profiles
//! - `/modules`, `/topics`, `/replies` the Q&A boards
//! - `/forum/*` the public forum
//! - `/messages/*` direct messages
//! - `/chatbot/*` the study assistant
//! - `/tutor-requests` human tutoring
//! - `/notifications` in-app notifications

use axum::{
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{auth, catalog, chatbot, forum, messages, notifications, topics, tutoring};
use super::AppState;

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me).patch(auth::update_me))
        .route("/me/modules", put(auth::set_my_modules))
        .route("/me/subscriptions", get(topics::my_subscriptions))
        .route("/users/:id", get(auth::get_user))
        .route("/tutors", get(auth::list_tutors))
        // modules and topics
        .route("/modules", get(catalog::list_modules).post(catalog::create_module))
        .route("/modules/:id", get(catalog::get_module))
        .route(
            "/modules/:id/topics",
            get(catalog::list_topics).post(catalog::create_topic),
        )
        .route(
            "/topics/:id",
            get(topics::get_topic)
                .patch(topics::update_topic)
                .delete(topics::delete_topic),
        )
        .route("/topics/:id/replies", post(topics::create_reply))
        .route("/topics/:id/accept/:reply_id", post(topics::accept_reply))
        .route(
            "/topics/:id/subscription",
            post(topics::subscribe).delete(topics::unsubscribe),
        )
        .route("/replies/:id", patch(topics::update_reply).delete(topics::delete_reply))
        .route("/replies/:id/vote", post(topics::vote_reply))
        // forum
        .route("/forum/posts", get(forum::list_posts).post(forum::create_post))
        .route(
            "/forum/posts/:id",
            get(forum::get_post)
                .patch(forum::update_post)
                .delete(forum::delete_post),
        )
        .route("/forum/posts/:id/vote", post(forum::vote_post))
        .route("/forum/posts/:id/comments", post(forum::create_comment))
        .route("/forum/comments/:id", delete(forum::delete_comment))
        // messaging
        .route("/messages/inbox", get(messages::inbox))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/messages/with/:user_id", get(messages::thread).post(messages::send))
        .route("/messages/:id", patch(messages::edit).delete(messages::delete))
        .route("/messages/:id/reactions", post(messages::react))
        // study assistant
        .route(
            "/chatbot/conversations",
            get(chatbot::list_conversations).post(chatbot::start_conversation),
        )
        .route("/chatbot/conversations/:id", get(chatbot::get_conversation))
        .route("/chatbot/conversations/:id/messages", post(chatbot::ask))
        .route("/chatbot/conversations/:id/escalate", post(chatbot::escalate))
        // tutoring
        .route(
            "/tutor-requests",
            get(tutoring::list_requests).post(tutoring::create_request),
        )
        .route("/tutor-requests/:id/accept", post(tutoring::accept))
        .route("/tutor-requests/:id/decline", post(tutoring::decline))
        .route("/tutor-requests/:id/complete", post(tutoring::complete))
        .route("/tutor-requests/:id/cancel", post(tutoring::cancel))
        // notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "tutorhub",
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::chatbot::{ChatRole, UnconfiguredCompletion};
    use crate::config::AppConfig;
    use crate::testing::{ScriptedCompletion, TestWorld};

    fn router(world: &TestWorld) -> Router {
        app_router(world.state(Arc::new(ScriptedCompletion::replying("Try drawing the recursion tree."))))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let world = TestWorld::new();
        let (status, json) = send(&router(&world), request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "tutorhub");
    }

    #[tokio::test]
    async fn test_register_login_me_logout() {
        let world = TestWorld::new();
        let app = router(&world);

        let (status, user) = send(
            &app,
            request(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": "Grace@Example.edu",
                    "display_name": "Grace",
                    "password": "hopper1906",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["email"], "grace@example.edu");
        assert_eq!(user["role"], "student");

        let (status, login) = send(
            &app,
            request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "grace@example.edu", "password": "hopper1906" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = login["token"].as_str().unwrap().to_string();

        let (status, me) = send(&app, request("GET", "/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["display_name"], "Grace");

        let (status, _) = send(&app, request("POST", "/auth/logout", Some(&token), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, request("GET", "/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_me_lists_teaching_modules_for_tutors() {
        let world = TestWorld::new();
        let app = router(&world);
        let tutor = world.token_for(&world.tutor);
        let student = world.token_for(&world.student);

        let (_, me) = send(&app, request("GET", "/me", Some(&tutor), None)).await;
        assert_eq!(me["teaching_module_ids"], json!([]));

        let (status, _) = send(
            &app,
            request(
                "PUT",
                "/me/modules",
                Some(&tutor),
                Some(json!({ "module_ids": [world.module.id] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, me) = send(&app, request("GET", "/me", Some(&tutor), None)).await;
        assert_eq!(me["teaching_module_ids"], json!([world.module.id]));
        assert_eq!(me["id"], world.tutor.id);

        let (_, me) = send(&app, request("GET", "/me", Some(&student), None)).await;
        assert!(me.get("teaching_module_ids").is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let world = TestWorld::new();
        let (status, _) = send(
            &router(&world),
            request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": world.student.email, "password": "nope-nope" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_routes_require_token() {
        let world = TestWorld::new();
        let app = router(&world);
        for uri in ["/modules", "/forum/posts", "/messages/inbox", "/notifications"] {
            let (status, _) = send(&app, request("GET", uri, None, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_topic_flow_over_http() {
        let world = TestWorld::new();
        let app = router(&world);
        let student = world.token_for(&world.student);
        let tutor = world.token_for(&world.tutor);

        let (status, topic) = send(
            &app,
            request(
                "POST",
                &format!("/modules/{}/topics", world.module.id),
                Some(&student),
                Some(json!({ "title": "Quicksort pivot", "body": "Why median of three?" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let topic_id = topic["id"].as_str().unwrap().to_string();

        let (status, reply) = send(
            &app,
            request(
                "POST",
                &format!("/topics/{}/replies", topic_id),
                Some(&tutor),
                Some(json!({ "body": "It avoids the sorted-input worst case." })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let reply_id = reply["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/topics/{}/accept/{}", topic_id, reply_id),
                Some(&tutor),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, accepted) = send(
            &app,
            request(
                "POST",
                &format!("/topics/{}/accept/{}", topic_id, reply_id),
                Some(&student),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "resolved");

        let (status, detail) =
            send(&app, request("GET", &format!("/topics/{}", topic_id), Some(&student), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["replies"][0]["accepted"], true);
        assert_eq!(detail["subscribed"], true);

        let (status, listed) = send(
            &app,
            request(
                "GET",
                &format!("/modules/{}/topics?status=resolved", world.module.id),
                Some(&student),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forum_vote_and_sort() {
        let world = TestWorld::new();
        let app = router(&world);
        let student = world.token_for(&world.student);
        let tutor = world.token_for(&world.tutor);

        let (_, post) = send(
            &app,
            request(
                "POST",
                "/forum/posts",
                Some(&student),
                Some(json!({ "title": "Study group?", "body": "Thursday evenings", "anonymous": true })),
            ),
        )
        .await;
        let post_id = post["id"].as_str().unwrap().to_string();

        let (status, tally) = send(
            &app,
            request(
                "POST",
                &format!("/forum/posts/{}/vote", post_id),
                Some(&tutor),
                Some(json!({ "value": "up" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tally["upvotes"], 1);
        assert_eq!(tally["my_vote"], "up");

        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/forum/posts/{}/vote", post_id),
                Some(&student),
                Some(json!({ "value": "up" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, posts) = send(&app, request("GET", "/forum/posts?sort=top", Some(&tutor), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posts[0]["author"]["anonymous"], true);
        assert_eq!(posts[0]["author"]["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_messaging_over_http() {
        let world = TestWorld::new();
        let app = router(&world);
        let student = world.token_for(&world.student);
        let tutor = world.token_for(&world.tutor);

        let (status, sent) = send(
            &app,
            request(
                "POST",
                &format!("/messages/with/{}", world.tutor.id),
                Some(&student),
                Some(json!({ "body": "Office hours today?" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["status"], "sent");

        let (_, unread) = send(&app, request("GET", "/messages/unread-count", Some(&tutor), None)).await;
        assert_eq!(unread["unread"], 1);

        let (status, thread) = send(
            &app,
            request("GET", &format!("/messages/with/{}?limit=10", world.student.id), Some(&tutor), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread["messages"][0]["status"], "read");

        let (_, unread) = send(&app, request("GET", "/messages/unread-count", Some(&tutor), None)).await;
        assert_eq!(unread["unread"], 0);
    }

    #[tokio::test]
    async fn test_chatbot_and_escalation_over_http() {
        let world = TestWorld::new();
        let app = router(&world);
        let student = world.token_for(&world.student);

        let (status, conversation) = send(
            &app,
            request(
                "POST",
                "/chatbot/conversations",
                Some(&student),
                Some(json!({ "module_id": world.module.id })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = conversation["id"].as_str().unwrap().to_string();

        let (status, exchange) = send(
            &app,
            request(
                "POST",
                &format!("/chatbot/conversations/{}/messages", id),
                Some(&student),
                Some(json!({ "content": "How does recursion end?" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exchange["answer"]["content"], "Try drawing the recursion tree.");

        let (status, request_body) = send(
            &app,
            request("POST", &format!("/chatbot/conversations/{}/escalate", id), Some(&student), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request_body["status"], "pending");
        assert_eq!(request_body["subject"], "How does recursion end?");

        let (status, _) = send(
            &app,
            request("POST", &format!("/chatbot/conversations/{}/escalate", id), Some(&student), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_history_window_comes_from_config() {
        let world = TestWorld::new();
        let client = Arc::new(ScriptedCompletion::replying("Noted."));
        let mut state = world.state(client.clone());
        let mut config = AppConfig::default();
        config.chatbot.max_history = 3;
        state.config = Arc::new(config);
        let app = app_router(state);
        let student = world.token_for(&world.student);

        let (_, conversation) =
            send(&app, request("POST", "/chatbot/conversations", Some(&student), None)).await;
        let id = conversation["id"].as_str().unwrap().to_string();
        for question in ["First", "Second", "Third"] {
            let (status, _) = send(
                &app,
                request(
                    "POST",
                    &format!("/chatbot/conversations/{}/messages", id),
                    Some(&student),
                    Some(json!({ "content": question })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let prompt = client.last_prompt();
        let contents: Vec<&str> = prompt[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(prompt[0].role, ChatRole::System);
        assert_eq!(contents, vec!["Second", "Noted.", "Third"]);
    }

    #[tokio::test]
    async fn test_unconfigured_assistant_is_unavailable() {
        let world = TestWorld::new();
        let app = app_router(world.state(Arc::new(UnconfiguredCompletion)));
        let student = world.token_for(&world.student);

        let (_, conversation) =
            send(&app, request("POST", "/chatbot/conversations", Some(&student), None)).await;
        let id = conversation["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/chatbot/conversations/{}/messages", id),
                Some(&student),
                Some(json!({ "content": "Hello?" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_tutor_request_lifecycle_and_notifications() {
        let world = TestWorld::new();
        let app = router(&world);
        let student = world.token_for(&world.student);
        let tutor = world.token_for(&world.tutor);

        let (status, _) = send(
            &app,
            request(
                "PUT",
                "/me/modules",
                Some(&tutor),
                Some(json!({ "module_ids": [world.module.id] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, created) = send(
            &app,
            request(
                "POST",
                "/tutor-requests",
                Some(&student),
                Some(json!({ "subject": "Graph traversal", "module_id": world.module.id })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (_, visible) = send(&app, request("GET", "/tutor-requests", Some(&tutor), None)).await;
        assert_eq!(visible.as_array().unwrap().len(), 1);

        let (status, accepted) = send(
            &app,
            request("POST", &format!("/tutor-requests/{}/accept", id), Some(&tutor), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "accepted");

        let (status, _) = send(
            &app,
            request("POST", &format!("/tutor-requests/{}/decline", id), Some(&tutor), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, notes) = send(&app, request("GET", "/notifications", Some(&student), None)).await;
        assert_eq!(notes.as_array().unwrap().len(), 1);
        let note_id = notes[0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            request("POST", &format!("/notifications/{}/read", note_id), Some(&tutor), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            request("POST", &format!("/notifications/{}/read", note_id), Some(&student), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, marked) = send(&app, request("POST", "/notifications/read-all", Some(&student), None)).await;
        assert_eq!(marked["marked"], 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let world = TestWorld::new();
        let app = router(&world);
        let token = world.token_for(&world.student);
        for uri in ["/modules/missing", "/topics/missing", "/forum/posts/missing", "/users/missing"] {
            let (status, body) = send(&app, request("GET", uri, Some(&token), None)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert!(body["error"].as_str().unwrap().contains("not found"));
        }
    }
}
