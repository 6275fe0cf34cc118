use super::*;

use std::collections::HashMap;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::{Value, json};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn user_exists_reads_body_of_conflict_answer() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/users/exists",
        get(|| async { (StatusCode::CONFLICT, Json(json!({"exists": true}))) }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(directory.user_exists("Blub", "Bla").await);
}

#[tokio::test]
async fn user_exists_false_when_name_is_free() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/users/exists",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("name").map(String::as_str), Some("Bla"));
            Json(json!({"exists": false}))
        }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(!directory.user_exists("Blub", "Bla").await);
}

#[tokio::test]
async fn user_exists_false_when_server_unreachable() {
    let directory = Directory::new(unreachable_base_url().await);
    assert!(!directory.user_exists("Blub", "Bla").await);
}

#[tokio::test]
async fn room_state_reads_progress_and_lock_flags() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/state",
        get(|| async { Json(json!({"inProgress": true, "isLocked": false})) }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(directory.round_in_progress("Blub").await);
    assert!(!directory.room_is_locked("Blub").await);
}

#[tokio::test]
async fn room_state_faults_collapse_to_false() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/state",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(!directory.round_in_progress("Blub").await);
    assert!(!directory.room_is_locked("Blub").await);
}

#[tokio::test]
async fn password_matches_room_resolves_server_verdict() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/authenticate",
        post(|Json(body): Json<Value>| async move {
            let ok = body.get("password").and_then(Value::as_str) == Some("top secret");
            Json(json!({"ok": ok}))
        }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(directory.password_matches_room("abc", "top secret").await);
    assert!(!directory.password_matches_room("abc", "wrong").await);
}

#[tokio::test]
async fn password_matches_room_false_on_non_2xx() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/authenticate",
        post(|| async { StatusCode::FORBIDDEN }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(!directory.password_matches_room("R1", "wrong").await);
}

#[tokio::test]
async fn fetch_permissions_parses_granted_capability() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/{username}/permissions",
        get(|| async { Json(json!({"permissions": {"room": {"canLock": true, "key": "abc"}}})) }),
    );
    let directory = Directory::new(serve(app).await);

    let permissions = directory.fetch_permissions("Test", "ABC").await;
    assert!(permissions.room.can_lock);
    assert_eq!(permissions.room.key.as_deref(), Some("abc"));
}

#[tokio::test]
async fn fetch_permissions_defaults_on_not_found() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/{username}/permissions",
        get(|| async { StatusCode::NOT_FOUND }),
    );
    let directory = Directory::new(serve(app).await);

    assert_eq!(directory.fetch_permissions("Test", "ABC").await, Permissions::default());
}

#[tokio::test]
async fn fetch_active_rooms_parses_listing() {
    let app = Router::new().route(
        "/api/estimation/room/rooms",
        get(|| async { Json(json!({"rooms": [{"id": "any-id", "playerCount": 1}]})) }),
    );
    let directory = Directory::new(serve(app).await);

    assert_eq!(
        directory.fetch_active_rooms().await,
        vec![RoomInfo { id: "any-id".to_owned(), player_count: 1 }]
    );
}

#[tokio::test]
async fn fetch_active_rooms_tolerates_null_listing() {
    let app = Router::new()
        .route("/api/estimation/room/rooms", get(|| async { Json(json!({"rooms": null})) }));
    let directory = Directory::new(serve(app).await);

    assert!(directory.fetch_active_rooms().await.is_empty());
}

#[tokio::test]
async fn fetch_possible_guesses_parses_catalog_in_order() {
    let app = Router::new().route(
        "/api/estimation/possible-guesses",
        get(|| async {
            Json(json!([
                {"guess": 1, "description": "Up to 4 hours"},
                {"guess": 2, "description": "Up to 8 hours"}
            ]))
        }),
    );
    let directory = Directory::new(serve(app).await);

    let catalog = directory.fetch_possible_guesses().await;
    assert_eq!(
        catalog,
        vec![
            GuessOption { guess: 1, description: "Up to 4 hours".to_owned() },
            GuessOption { guess: 2, description: "Up to 8 hours".to_owned() },
        ]
    );
}

#[tokio::test]
async fn fetch_possible_guesses_empty_on_fault() {
    let app = Router::new().route(
        "/api/estimation/possible-guesses",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(directory.fetch_possible_guesses().await.is_empty());
}

#[tokio::test]
async fn fetch_users_parses_role_tagged_roster() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/users",
        get(|| async {
            Json(json!([
                {"name": "Ann", "role": "developer", "isDone": true},
                {"name": "Pia", "role": "product-owner"}
            ]))
        }),
    );
    let directory = Directory::new(serve(app).await);

    assert_eq!(
        directory.fetch_users("Test").await,
        vec![
            UserEntry::Developer { name: "Ann".to_owned(), is_done: true },
            UserEntry::ProductOwner { name: "Pia".to_owned() },
        ]
    );
}

#[tokio::test]
async fn fetch_users_tolerates_null_roster() {
    let app = Router::new()
        .route("/api/estimation/room/{id}/users", get(|| async { Json(json!(null)) }));
    let directory = Directory::new(serve(app).await);

    assert!(directory.fetch_users("Test").await.is_empty());
}

#[tokio::test]
async fn fetch_users_empty_on_non_2xx() {
    let app = Router::new().route(
        "/api/estimation/room/{id}/users",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let directory = Directory::new(serve(app).await);

    assert!(directory.fetch_users("Test").await.is_empty());
}
