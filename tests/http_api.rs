//! Drives the router end to end with shared-secret tokens and an in-memory
//! SQLite database.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
        Request, Response, StatusCode,
    },
    Router,
};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqlitePoolOptions;
use task_lists::{
    auth::SharedSecretVerifier,
    model::UserId,
    repo::SqliteUserRepository,
    route::create_router,
    schema::{ListIndexView, ListView},
    store::{TaskListStore, DEFAULT_MAX_WRITE_ATTEMPTS},
    AppState,
};
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-secret";

async fn app_with_state() -> (Router, Arc<AppState>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let repo = SqliteUserRepository::new(pool);
    repo.init().await.unwrap();

    let state = Arc::new(AppState {
        store: TaskListStore::new(repo, DEFAULT_MAX_WRITE_ATTEMPTS),
        verifier: Arc::new(SharedSecretVerifier::new(SECRET)),
        cognito: None,
    });
    (create_router(Arc::clone(&state)), state)
}

async fn app() -> Router {
    app_with_state().await.0
}

fn token(user: &str, name: Option<&str>) -> String {
    SharedSecretVerifier::new(SECRET)
        .issue(&UserId::new(user), name, 3600)
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, token: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .unwrap()
}

fn location(response: &Response<axum::body::BoxBody>) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[LOCATION].to_str().unwrap()
}

async fn body<T: DeserializeOwned>(response: Response<axum::body::BoxBody>) -> T {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn json<T: DeserializeOwned>(response: Response<axum::body::BoxBody>) -> T {
    assert_eq!(response.status(), StatusCode::OK);
    body(response).await
}

async fn signed_in(app: &Router, user: &str, name: &str) -> String {
    let token = token(user, Some(name));
    let response = app
        .clone()
        .oneshot(post_form("/auth/callback", &token, ""))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");
    token
}

#[tokio::test]
async fn health_check_is_public() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/lists").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = SharedSecretVerifier::new(b"wrong")
        .issue(&UserId::new("alice"), None, 3600)
        .unwrap();
    let response = app.oneshot(get("/lists", &forged)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn credential_login_is_unavailable_without_cognito() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username":"alice","password":"pw"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn unknown_user_gets_not_found() {
    let app = app().await;
    let response = app
        .oneshot(get("/lists", &token("stranger", None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chores_round_trip_over_http() {
    let app = app().await;
    let token = signed_in(&app, "alice", "Alice").await;

    let index: ListIndexView = json(app.clone().oneshot(get("/lists", &token)).await.unwrap()).await;
    assert_eq!(index.display_name, "Alice");
    assert!(index.lists.is_empty());

    let response = app
        .clone()
        .oneshot(post_form("/lists", &token, "name=%20%20chores%21"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists/Chores");

    let response = app
        .clone()
        .oneshot(post_form("/lists/chores/tasks", &token, "text=Wash+dishes"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists/Chores");

    let view: ListView = json(app.clone().oneshot(get("/lists/Chores", &token)).await.unwrap()).await;
    assert_eq!(view.list_name.as_str(), "Chores");
    assert_eq!(view.tasks.len(), 4);
    let dishes = view.tasks.last().unwrap();
    assert_eq!(dishes.name, "Wash dishes");
    assert!(!dishes.completed);

    let uri = format!("/lists/Chores/tasks/{}/completed", dishes.id);
    let response = app
        .clone()
        .oneshot(post_form(&uri, &token, "completed=true"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists/Chores");

    let view: ListView = json(app.clone().oneshot(get("/lists/Chores", &token)).await.unwrap()).await;
    let completed: Vec<_> = view.tasks.iter().filter(|task| task.completed).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, dishes.id);

    let uri = format!("/lists/Chores/tasks/{}/toggle", dishes.id);
    app.clone().oneshot(post_form(&uri, &token, "")).await.unwrap();
    let uri = format!("/lists/Chores/tasks/{}/delete", view.tasks[0].id);
    app.clone().oneshot(post_form(&uri, &token, "")).await.unwrap();

    let view: ListView = json(app.clone().oneshot(get("/lists/Chores", &token)).await.unwrap()).await;
    assert_eq!(view.tasks.len(), 3);
    assert!(view.tasks.iter().all(|task| !task.completed));

    let response = app
        .clone()
        .oneshot(post_form("/delete-list", &token, &format!("list_id={}", view.list_id)))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");

    let index: ListIndexView = json(app.oneshot(get("/lists", &token)).await.unwrap()).await;
    assert!(index.lists.is_empty());
}

#[tokio::test]
async fn invalid_or_missing_lists_redirect_to_the_index() {
    let app = app().await;
    let token = signed_in(&app, "alice", "Alice").await;

    let response = app
        .clone()
        .oneshot(post_form("/lists", &token, "name=%21%21%21"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");

    let response = app.clone().oneshot(get("/lists/Nowhere", &token)).await.unwrap();
    assert_eq!(location(&response), "/lists");

    let response = app
        .clone()
        .oneshot(post_form("/lists/Nowhere/tasks", &token, "text=lost"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");

    let index: ListIndexView = json(app.oneshot(get("/lists", &token)).await.unwrap()).await;
    assert!(index.lists.is_empty());
}

#[tokio::test]
async fn creating_the_same_list_twice_keeps_one() {
    let app = app().await;
    let token = signed_in(&app, "alice", "Alice").await;

    for form in ["name=Groceries", "name=groceries%21%21"] {
        let response = app.clone().oneshot(post_form("/lists", &token, form)).await.unwrap();
        assert_eq!(location(&response), "/lists/Groceries");
    }

    let index: ListIndexView = json(app.oneshot(get("/lists", &token)).await.unwrap()).await;
    assert_eq!(index.lists.len(), 1);
    assert_eq!(index.lists[0].task_count, 3);
    assert_eq!(index.lists[0].completed_count, 0);
}

#[tokio::test]
async fn users_never_see_each_others_lists() {
    let app = app().await;
    let alice = signed_in(&app, "alice", "Alice").await;
    let bob = signed_in(&app, "bob", "Bob").await;

    app.clone()
        .oneshot(post_form("/lists", &alice, "name=Secret"))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/lists/Secret", &bob)).await.unwrap();
    assert_eq!(location(&response), "/lists");

    let index: ListIndexView = json(app.oneshot(get("/lists", &bob)).await.unwrap()).await;
    assert_eq!(index.display_name, "Bob");
    assert!(index.lists.is_empty());
}

#[tokio::test]
async fn login_without_a_name_keeps_the_stored_display_name() {
    let app = app().await;
    signed_in(&app, "alice", "Alice Liddell").await;

    let nameless = token("alice", None);
    let response = app
        .clone()
        .oneshot(post_form("/auth/callback", &nameless, ""))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");

    let index: ListIndexView = json(app.oneshot(get("/lists", &nameless)).await.unwrap()).await;
    assert_eq!(index.display_name, "Alice Liddell");
}

#[tokio::test]
async fn malformed_ids_are_treated_as_unknown() {
    let app = app().await;
    let token = signed_in(&app, "alice", "Alice").await;
    app.clone()
        .oneshot(post_form("/lists", &token, "name=Chores"))
        .await
        .unwrap();

    for action in ["completed", "toggle", "delete"] {
        let uri = format!("/lists/Chores/tasks/not-a-uuid/{action}");
        let response = app
            .clone()
            .oneshot(post_form(&uri, &token, "completed=true"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/lists/Chores");
    }

    let response = app
        .clone()
        .oneshot(post_form("/delete-list", &token, "list_id=garbage"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/lists");

    let view: ListView = json(app.oneshot(get("/lists/Chores", &token)).await.unwrap()).await;
    assert_eq!(view.tasks.len(), 3);
    assert!(view.tasks.iter().all(|task| !task.completed));
}

#[tokio::test]
async fn database_outage_is_a_json_server_error() {
    let (app, state) = app_with_state().await;
    let token = signed_in(&app, "alice", "Alice").await;
    state.store.repository().close().await;

    for request in [
        get("/lists", &token),
        post_form("/lists", &token, "name=Chores"),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: serde_json::Value = body(response).await;
        assert_eq!(envelope["status"], "error");
    }
}
