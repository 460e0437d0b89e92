use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use lecture_player_lib::api::{ApiClient, ApiError};
use lecture_player_lib::auth::{Role, SessionContext, Tokens, UserProfile};
use lecture_player_lib::catalog::{CatalogLoader, LectureCatalog, VideoSource};
use lecture_player_lib::error::PlayerError;
use lecture_player_lib::api::RetryPolicy;
use lecture_player_lib::notify::Notifier;
use lecture_player_lib::progress::{LocalTier, ProgressStore, RestoreSource};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn jwt(exp_offset_secs: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "sub": "u1", "role": "student", "exp": exp, "jti": tag })
            .to_string()
            .as_bytes(),
    );
    format!("{}.{}.sig", header, payload)
}

#[derive(Default)]
struct Backend {
    accepted: Mutex<String>,
    refresh_token: Mutex<String>,
    reject_all: AtomicBool,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    progress: Mutex<HashMap<(String, String), Value>>,
}

type Shared = Arc<Backend>;

impl Backend {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        let expected = format!("Bearer {}", self.accepted.lock().unwrap());
        let ok = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value == expected);
        if !ok {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
        }
        ok
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn login(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return unauthorized();
    }
    let token = jwt(3600, "login");
    *backend.accepted.lock().unwrap() = token.clone();
    Json(json!({
        "accessToken": token,
        "refreshToken": backend.refresh_token.lock().unwrap().clone(),
        "user": { "_id": "u1", "name": "Ada", "email": body["email"], "role": "student" }
    }))
    .into_response()
}

async fn refresh(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["refreshToken"] != *backend.refresh_token.lock().unwrap() {
        return unauthorized();
    }
    let calls = backend.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let token = jwt(3600, &format!("refresh-{}", calls));
    *backend.accepted.lock().unwrap() = token.clone();
    Json(json!({ "accessToken": token })).into_response()
}

async fn lectures(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(course_id): Path<String>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    if course_id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Course not found" })))
            .into_response();
    }
    Json(json!({
        "lectures": [
            {
                "_id": "L1",
                "lectureTitle": "Introduction",
                "videoInfo": { "videoUrl": "https://cdn.example.com/l1.mp4", "publicId": "video1" },
                "duration": 300,
                "isPreviewFree": true
            },
            {
                "_id": "L2",
                "lectureTitle": "State",
                "videoInfo": { "publicId": "video2" },
                "duration": 400
            }
        ]
    }))
    .into_response()
}

async fn push_progress(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let key = (
        body["userId"].as_str().unwrap_or_default().to_string(),
        body["courseId"].as_str().unwrap_or_default().to_string(),
    );
    backend.progress.lock().unwrap().insert(
        key,
        json!({ "lectureId": body["lectureId"], "playedSeconds": body["playedSeconds"] }),
    );
    Json(json!({ "message": "Progress updated" })).into_response()
}

async fn fetch_progress(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let progress: Vec<Value> = backend
        .progress
        .lock()
        .unwrap()
        .get(&(user_id, course_id))
        .cloned()
        .into_iter()
        .collect();
    Json(json!({ "progress": progress })).into_response()
}

async fn published_courses() -> Json<Value> {
    Json(json!([
        { "_id": "c1", "courseTitle": "React Basics", "courseLevel": "Beginner", "coursePrice": 49.0, "isPublished": true },
        { "_id": "c2", "courseTitle": "Draft", "isPublished": false }
    ]))
}

async fn spawn_backend(backend: Shared) -> String {
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/lectures/:course_id", get(lectures))
        .route("/api/v1/progress", post(push_progress))
        .route("/api/v1/progress/:user_id/:course_id", get(fetch_progress))
        .route("/api/v1/courses/published-courses", get(published_courses))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}

fn backend_with(accepted: &str, refresh_token: &str) -> Shared {
    let backend = Backend::default();
    *backend.accepted.lock().unwrap() = accepted.to_string();
    *backend.refresh_token.lock().unwrap() = refresh_token.to_string();
    Arc::new(backend)
}

fn signed_in(access_token: &str, refresh_token: Option<&str>) -> SessionContext {
    SessionContext::authenticated(
        UserProfile {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Student,
        },
        Tokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        },
    )
}

async fn client_for(backend: &Shared, session: SessionContext) -> ApiClient {
    let base = spawn_backend(backend.clone()).await;
    ApiClient::new(&base, Duration::from_secs(5), session).unwrap()
}

#[tokio::test]
async fn unauthorized_request_is_refreshed_and_replayed() {
    let backend = backend_with("nobody-has-this", "r1");
    let client = client_for(&backend, signed_in(&jwt(3600, "stale"), Some("r1"))).await;

    let lectures = client.lectures("c1").await.unwrap();

    assert_eq!(lectures.len(), 2);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.unauthorized.load(Ordering::SeqCst), 1);
    let current = client.session().tokens().access_token().await.unwrap();
    assert_eq!(current, *backend.accepted.lock().unwrap());
}

#[tokio::test]
async fn second_unauthorized_is_final() {
    let backend = backend_with("nobody-has-this", "r1");
    backend.reject_all.store(true, Ordering::SeqCst);
    let client = client_for(&backend, signed_in(&jwt(3600, "stale"), Some("r1"))).await;

    let result = client.lectures("c1").await;

    assert_eq!(result, Err(ApiError::AuthenticationError));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.unauthorized.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_token_is_refreshed_before_sending() {
    let backend = backend_with("nobody-has-this", "r1");
    let client = client_for(&backend, signed_in(&jwt(-60, "expired"), Some("r1"))).await;

    client.lectures("c1").await.unwrap();

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.unauthorized.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_refresh_clears_tokens() {
    let backend = backend_with("nobody-has-this", "r1");
    let client = client_for(&backend, signed_in(&jwt(3600, "stale"), Some("revoked"))).await;

    let result = client.lectures("c1").await;

    assert_eq!(result, Err(ApiError::AuthenticationError));
    assert!(client.session().tokens().get().await.is_none());
}

#[tokio::test]
async fn concurrent_unauthorized_requests_refresh_once() {
    let backend = backend_with("nobody-has-this", "r1");
    let client = client_for(&backend, signed_in(&jwt(3600, "stale"), Some("r1"))).await;

    let (a, b) = tokio::join!(client.lectures("c1"), client.lectures("c1"));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let token = jwt(3600, "valid");
    let backend = backend_with(&token, "r1");
    let client = client_for(&backend, signed_in(&token, Some("r1"))).await;

    let loader = CatalogLoader::new(
        Arc::new(client),
        RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)),
    );
    let result = loader.load("missing").await;

    assert!(matches!(result, Err(PlayerError::NotFound(_))));
}

#[tokio::test]
async fn lectures_map_backend_shape() {
    let token = jwt(3600, "valid");
    let backend = backend_with(&token, "r1");
    let client = client_for(&backend, signed_in(&token, None)).await;

    let lectures = client.lectures("c1").await.unwrap();

    assert_eq!(lectures[0].title, "Introduction");
    assert_eq!(lectures[0].duration_secs, 300);
    assert!(lectures[0].preview_free);
    assert!(matches!(lectures[0].source, VideoSource::Url(_)));
    assert_eq!(lectures[1].source, VideoSource::Storage("video2".to_string()));
}

#[tokio::test]
async fn progress_round_trips_through_backend() {
    let token = jwt(3600, "valid");
    let backend = backend_with(&token, "r1");
    let client = client_for(&backend, signed_in(&token, Some("r1"))).await;
    let lectures = client.lectures("c1").await.unwrap();

    let store = ProgressStore::new(
        LocalTier::in_memory(),
        Arc::new(client.clone()),
        3,
        Notifier::disabled(),
    );
    store
        .flush_now("u1", "c1", &lectures[1], 120.0)
        .await
        .unwrap();

    let restored = store.restore("u1", "c1").await;
    assert_eq!(restored.source, RestoreSource::Remote);
    let resume = restored.resume.unwrap();
    assert_eq!(resume.lecture_id, "L2");
    assert_eq!(resume.elapsed_secs, 120.0);
}

#[tokio::test]
async fn login_builds_a_session() {
    let backend = backend_with("none-yet", "r1");
    let client = client_for(&backend, SessionContext::anonymous()).await;

    let response = client.login("ada@example.com", "secret").await.unwrap();
    let session = response.into_session();

    assert_eq!(session.role(), Some(Role::Student));
    assert_eq!(session.user_id(), Some("u1"));
    assert_eq!(
        session.tokens().get().await.unwrap().refresh_token.as_deref(),
        Some("r1")
    );

    let rejected = client.login("ada@example.com", "wrong").await;
    assert_eq!(rejected.err(), Some(ApiError::AuthenticationError));
}

#[tokio::test]
async fn only_published_courses_are_listed() {
    let backend = backend_with("none", "r1");
    let client = client_for(&backend, SessionContext::anonymous()).await;

    let courses = client.published_courses().await.unwrap();

    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].course_title, "React Basics");
}
