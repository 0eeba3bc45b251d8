use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};

use roam_sync::{
    ActionCoordinator, ActionOutcome, ConnectionApi, ConnectionViewModel, EventBus,
    HttpConnectionApi, LocalCache, RemoteError, Session, SessionSlot, SyncContext,
};
use roam_types::{ConnectionStatus, Direction};

const TOKEN: &str = "test-token";

type Log = Arc<Mutex<Vec<String>>>;

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", TOKEN);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn all(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" })));
    }
    (
        StatusCode::OK,
        Json(json!([
            {
                "_id": "c1",
                "sender": { "_id": "U1", "name": "Ana" },
                "receiver": { "_id": "U2", "name": "Ben", "avatar": "ben.png" },
                "status": "pending",
                "createdAt": "2024-05-01T10:00:00Z"
            }
        ])),
    )
}

async fn buddies() -> Json<Value> {
    Json(json!({
        "buddies": [
            { "id": "c7", "senderId": "U5", "receiverId": "U1", "status": "ACCEPTED" }
        ]
    }))
}

async fn incoming() -> Json<Value> {
    Json(json!({ "data": [] }))
}

async fn create(State(log): State<Log>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let receiver = body["receiverId"].as_str().unwrap_or_default().to_string();
    log.lock().unwrap().push(format!("POST {}", receiver));

    match receiver.as_str() {
        "U8" => (StatusCode::FORBIDDEN, Json(json!({ "message": "Request limit reached" }))),
        "U9" => (StatusCode::CONFLICT, Json(json!({ "error": "Connection already exists" }))),
        _ => (
            StatusCode::CREATED,
            Json(json!({ "connection": { "_id": "c42", "senderId": "U1", "receiverId": receiver.clone(), "status": "PENDING" } })),
        ),
    }
}

async fn respond(
    State(log): State<Log>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    log.lock()
        .unwrap()
        .push(format!("PATCH {} {}", id, body["status"].as_str().unwrap_or_default()));
    StatusCode::OK
}

async fn remove(State(log): State<Log>, Path(id): Path<String>) -> StatusCode {
    log.lock().unwrap().push(format!("DELETE {}", id));
    StatusCode::NO_CONTENT
}

async fn spawn_server() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/connections/all", get(all))
        .route("/api/connections/buddies", get(buddies))
        .route("/api/connections/incoming", get(incoming))
        .route("/api/connections", post(create))
        .route("/api/connections/respond/{id}", patch(respond))
        .route("/api/connections/{id}", delete(remove))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/", addr), log)
}

fn session() -> Session {
    Session::new("U1", TOKEN)
}

#[tokio::test]
async fn lists_are_normalized() {
    let (base, _) = spawn_server().await;
    let api = HttpConnectionApi::new(base);
    assert!(!api.base_url().ends_with('/'));

    let records = api.all(&session()).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id.as_str(), "c1");
    assert_eq!(record.status, ConnectionStatus::Pending);
    assert_eq!(
        record.counterpart_profile(&"U1".into()).unwrap().profile_image.as_deref(),
        Some("ben.png")
    );

    let buddies = api.buddies(&session()).await.unwrap();
    assert_eq!(buddies[0].id.as_str(), "c7");
    assert!(api.incoming(&session()).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_token_maps_to_unauthorized() {
    let (base, _) = spawn_server().await;
    let api = HttpConnectionApi::new(base);
    let err = api.all(&Session::new("U1", "wrong")).await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized);
}

#[tokio::test]
async fn mutations_hit_the_expected_routes() {
    let (base, log) = spawn_server().await;
    let api = HttpConnectionApi::new(base);

    let id = api.create(&session(), &"U2".into()).await.unwrap();
    assert_eq!(id.as_str(), "c42");

    api.respond(&session(), &id, ConnectionStatus::Accepted).await.unwrap();
    api.delete(&session(), &id).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["POST U2", "PATCH c42 ACCEPTED", "DELETE c42"]
    );
}

#[tokio::test]
async fn error_bodies_carry_server_messages() {
    let (base, _) = spawn_server().await;
    let api = HttpConnectionApi::new(base);

    let quota = api.create(&session(), &"U8".into()).await.unwrap_err();
    assert_eq!(quota, RemoteError::status(403, "Request limit reached"));

    let conflict = api.create(&session(), &"U9".into()).await.unwrap_err();
    assert_eq!(conflict, RemoteError::status(409, "Connection already exists"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpConnectionApi::new(format!("http://{}", addr));
    assert!(matches!(
        api.all(&session()).await,
        Err(RemoteError::Transport(_))
    ));
}

#[tokio::test]
async fn coordinator_over_http() {
    let (base, log) = spawn_server().await;
    let ctx = SyncContext::new(
        Arc::new(HttpConnectionApi::new(base)),
        EventBus::new(),
        LocalCache::in_memory(),
        Arc::new(SessionSlot::new(Some(session()))),
    );
    let coordinator = ActionCoordinator::new(ctx.clone());

    let existing = ConnectionViewModel::mount(&ctx, "U2".into(), None).await;
    assert_eq!(existing.state().direction, Some(Direction::Sent));
    assert_eq!(
        coordinator.connect(&existing).await,
        ActionOutcome::AlreadyActive(ConnectionStatus::Pending)
    );

    let limited = ConnectionViewModel::mount(&ctx, "U8".into(), None).await;
    assert_eq!(
        coordinator.connect(&limited).await,
        ActionOutcome::UpgradeRequired("Request limit reached".into())
    );
    assert!(limited.state().is_empty());

    let fresh = ConnectionViewModel::mount(&ctx, "U3".into(), None).await;
    assert_eq!(coordinator.connect(&fresh).await, ActionOutcome::Sent("c42".into()));

    assert_eq!(*log.lock().unwrap(), vec!["POST U8", "POST U3"]);
}
