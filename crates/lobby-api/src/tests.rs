use std::sync::{Arc, Mutex};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::IntoResponse as _,
};
use chrono::{TimeDelta, TimeZone as _, Utc};
use lobby_core::{Lobby, clock::ManualClock, settings::LobbySettings};
use lobby_store_memory::MemoryStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{ApiError, ApiState, api_router};

struct Harness {
  state: ApiState<MemoryStore>,
  clock: Arc<ManualClock>,
}

async fn harness() -> Harness {
  let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
  let clock = Arc::new(ManualClock::new(start));
  let store = Arc::new(MemoryStore::with_clock(clock.clone()));
  let lobby = Lobby::new(store, clock.clone(), &LobbySettings::default());
  lobby.install().await.unwrap();
  Harness {
    state: ApiState { lobby: Arc::new(lobby), backend: "memory" },
    clock,
  }
}

async fn call(
  state:  &ApiState<MemoryStore>,
  method: &str,
  uri:    &str,
  body:   Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = api_router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn register(state: &ApiState<MemoryStore>, name: &str) -> String {
  let (status, body) = call(state, "POST", "/user", Some(json!({ "name": name }))).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["udid"].as_str().unwrap().to_owned()
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_returns_created_user() {
  let h = harness().await;
  let (status, body) = call(&h.state, "POST", "/user", Some(json!({ "name": "Ada" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["name"], "Ada");
  assert_eq!(body["udid"].as_str().unwrap().len(), 36);
  assert_eq!(body["created_at"], "2024-05-01T09:00:00.000000Z");
}

#[tokio::test]
async fn register_duplicate_name_conflicts() {
  let h = harness().await;
  register(&h.state, "Ada").await;
  let (status, body) = call(&h.state, "POST", "/user", Some(json!({ "name": "Ada" }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(
    body["error"],
    "Username already taken. Please choose a different name."
  );
}

#[tokio::test]
async fn register_blank_or_missing_name_is_bad_request() {
  let h = harness().await;
  for body in [json!({ "name": "   " }), json!({})] {
    let (status, resp) = call(&h.state, "POST", "/user", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "Name is required");
  }
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
  let h = harness().await;
  let req = Request::builder()
    .method("POST")
    .uri("/user")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = api_router(h.state.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookup_returns_registered_user() {
  let h = harness().await;
  let udid = register(&h.state, "Grace").await;
  let (status, body) = call(&h.state, "GET", &format!("/user/{udid}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["name"], "Grace");
  assert_eq!(body["udid"], udid.as_str());
}

#[tokio::test]
async fn lookup_unknown_udid_is_not_found() {
  let h = harness().await;
  let (status, body) = call(&h.state, "GET", "/user/nobody", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "User not found");
}

// ── Achievements ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn unlock_is_created_once_then_ok() {
  let h = harness().await;
  let udid = register(&h.state, "Ada").await;
  let uri = format!("/user/{udid}/achievements");

  let (first, body) = call(&h.state, "POST", &uri, Some(json!({ "achievement_id": "explorer" }))).await;
  assert_eq!(first, StatusCode::CREATED);
  assert_eq!(body["achievement_id"], "explorer");

  h.clock.advance(TimeDelta::seconds(5));
  let (second, again) = call(&h.state, "POST", &uri, Some(json!({ "achievement_id": "explorer" }))).await;
  assert_eq!(second, StatusCode::OK);
  assert_eq!(again["unlocked_at"], body["unlocked_at"]);

  let (status, list) = call(&h.state, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn achievements_for_unknown_user_are_not_found() {
  let h = harness().await;
  let (status, _) = call(
    &h.state,
    "POST",
    "/user/ghost/achievements",
    Some(json!({ "achievement_id": "explorer" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = call(&h.state, "GET", "/user/ghost/achievements", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unlock_without_id_is_bad_request() {
  let h = harness().await;
  let udid = register(&h.state, "Ada").await;
  let (status, body) = call(&h.state, "POST", &format!("/user/{udid}/achievements"), Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Achievement ID is required");
}

// ── Presence ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn heartbeat_then_listed_until_window_passes() {
  let h = harness().await;
  let (status, body) = call(
    &h.state,
    "POST",
    "/users/active",
    Some(json!({ "udid": "u-1", "name": "Ada" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "status": "success" }));

  let (_, listed) = call(&h.state, "GET", "/users/active", None).await;
  assert_eq!(listed, json!([{ "udid": "u-1", "name": "Ada" }]));

  h.clock.advance(TimeDelta::minutes(5));
  let (_, listed) = call(&h.state, "GET", "/users/active", None).await;
  assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn heartbeat_missing_fields_is_bad_request() {
  let h = harness().await;
  let (status, body) = call(&h.state, "POST", "/users/active", Some(json!({ "udid": "u-1" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "UDID and name are required");
}

// ── Chat ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_keeps_last_twenty_in_order() {
  let h = harness().await;
  for i in 0..23 {
    h.clock.advance(TimeDelta::seconds(1));
    let (status, _) = call(
      &h.state,
      "POST",
      "/chat/messages",
      Some(json!({ "user": "Ada", "message": format!("m{i}"), "udid": "u-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let (status, body) = call(&h.state, "GET", "/chat/messages", None).await;
  assert_eq!(status, StatusCode::OK);
  let texts: Vec<&str> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["message"].as_str().unwrap())
    .collect();
  let expected: Vec<String> = (3..23).map(|i| format!("m{i}")).collect();
  assert_eq!(texts, expected);
}

#[tokio::test]
async fn chat_append_echoes_message() {
  let h = harness().await;
  let (status, body) = call(
    &h.state,
    "POST",
    "/chat/messages",
    Some(json!({ "user": "Ada", "message": "hello" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["user"], "Ada");
  assert_eq!(body["message"], "hello");
  assert_eq!(body["udid"], "");
  assert_eq!(body["timestamp"], "2024-05-01T09:00:00.000000Z");

  let (_, listed) = call(&h.state, "GET", "/chat/messages", None).await;
  assert_eq!(listed, json!([body]));
}

#[tokio::test]
async fn chat_missing_message_is_bad_request() {
  let h = harness().await;
  let (status, body) = call(&h.state, "POST", "/chat/messages", Some(json!({ "user": "Ada" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "User and message are required");

  let (_, listed) = call(&h.state, "GET", "/chat/messages", None).await;
  assert_eq!(listed, json!([]));
}

// ── Feedback ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_accepts_complete_form() {
  let h = harness().await;
  let (status, body) = call(
    &h.state,
    "POST",
    "/feedback",
    Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "Nice", "rating": 5 })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body, json!({ "status": "success" }));
}

/// Collects formatted log lines for inspection.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

#[tokio::test]
async fn feedback_log_omits_email() {
  let logs = LogBuffer::default();
  let writer = logs.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_ansi(false)
    .with_writer(move || writer.clone())
    .finish();
  let _guard = tracing::subscriber::set_default(subscriber);

  let h = harness().await;
  let (status, _) = call(
    &h.state,
    "POST",
    "/feedback",
    Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "Nice", "rating": 4 })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
  assert!(text.contains("feedback received"), "{text}");
  assert!(text.contains("rating=4"), "{text}");
  assert!(!text.contains("ada@example.com"), "{text}");
}

#[tokio::test]
async fn feedback_missing_email_is_bad_request() {
  let h = harness().await;
  let (status, body) = call(
    &h.state,
    "POST",
    "/feedback",
    Some(json!({ "name": "Ada", "message": "Nice" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Name, email, and message are required");
}

// ── Health ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_backend_and_time() {
  let h = harness().await;
  let (status, body) = call(&h.state, "GET", "/health", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
  assert_eq!(body["backend"], "memory");
  assert_eq!(body["timestamp"], "2024-05-01T09:00:00.000000Z");
}

#[tokio::test]
async fn health_counts_live_documents_per_collection() {
  let h = harness().await;
  register(&h.state, "Ada").await;
  register(&h.state, "Grace").await;
  call(&h.state, "POST", "/users/active", Some(json!({ "udid": "u-1", "name": "Ada" }))).await;
  call(&h.state, "POST", "/chat/messages", Some(json!({ "user": "Ada", "message": "hi" }))).await;

  let (_, body) = call(&h.state, "GET", "/health", None).await;
  assert_eq!(
    body["collections"],
    json!({
      "users": 2,
      "active_users": 1,
      "chat_messages": 1,
      "feedback": 0,
      "user_achievements": 0,
    })
  );

  h.clock.advance(TimeDelta::minutes(5));
  let (_, body) = call(&h.state, "GET", "/health", None).await;
  assert_eq!(body["collections"]["active_users"], 0);
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_failure_is_opaque_500() {
  let cause = std::io::Error::other("disk I/O error at /var/lib/lobby.sqlite");
  let resp = ApiError::from(lobby_core::Error::store(cause)).into_response();
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let text = std::str::from_utf8(&bytes).unwrap();
  assert!(!text.contains("disk"), "leaked: {text}");
  assert!(!text.contains("lobby.sqlite"), "leaked: {text}");
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body, json!({ "error": "internal server error" }));
}
