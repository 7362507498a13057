//! In-memory application harness

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use ivp_api::services::AudioStore;
use ivp_api::workflow::IngestionPipeline;
use ivp_api::{build_router, AppState, RouterSettings};

use super::stubs::{sample_feedback, StubFeedback, StubFeedbackOutcome, StubTranscriber, StubTranscription};

pub const TEST_JWT_SECRET: &str = "test-secret";
const BOUNDARY: &str = "ivp-test-boundary";

/// Router plus everything a test may want to inspect behind it
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: SqlitePool,
    pub transcriber: Arc<StubTranscriber>,
    pub feedback: Arc<StubFeedback>,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// App whose vendors always succeed
    pub async fn new() -> Self {
        Self::with_vendors(
            StubTranscription::Text("I led the migration to a new queue.".to_string(), Some(42.5)),
            StubFeedbackOutcome::Ok(sample_feedback()),
        )
        .await
    }

    pub async fn with_vendors(transcription: StubTranscription, feedback: StubFeedbackOutcome) -> Self {
        let db = ivp_common::db::init_memory_database()
            .await
            .expect("Failed to create in-memory database");
        let upload_dir = tempfile::tempdir().expect("Failed to create temp dir");

        let transcriber = Arc::new(StubTranscriber::new(transcription));
        let feedback = Arc::new(StubFeedback::new(feedback));

        let pipeline = IngestionPipeline::new(
            db.clone(),
            AudioStore::new(upload_dir.path()),
            transcriber.clone(),
            feedback.clone(),
        );
        let state = AppState::new(db.clone(), pipeline, TEST_JWT_SECRET);
        let router = build_router(state.clone(), &RouterSettings::default());

        Self {
            router,
            state,
            db,
            transcriber,
            feedback,
            upload_dir,
        }
    }

    /// Send one request and decode the JSON body (Null when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    /// Register `email` with a valid password and return its bearer token
    pub async fn register_and_login(&self, email: &str) -> String {
        let (status, _) = self
            .send(json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({"email": email, "username": email, "password": "correct-horse"}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "registration of {} failed", email);

        let (status, body) = self.login(email, "correct-horse").await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let form = format!("username={}&password={}", email.replace('@', "%40"), password);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/jwt/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(request).await
    }

    /// Insert a behavioral question and return its id
    pub async fn seed_question(&self, text: &str) -> i64 {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/questions",
                None,
                json!({"text": text, "category": "behavioral"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_i64().unwrap()
    }

    /// Submit `audio` as an answer to `question_id`
    pub async fn submit(&self, token: &str, question_id: i64, audio: &[u8]) -> (StatusCode, Value) {
        self.send(multipart_request(
            token,
            Some(&question_id.to_string()),
            Some(("answer.webm", audio)),
        ))
        .await
    }

    pub async fn recording_status(&self, recording_id: Uuid) -> Option<(String, Option<String>)> {
        sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT status, failure_reason FROM recordings WHERE id = ?",
        )
        .bind(recording_id.to_string())
        .fetch_optional(&self.db)
        .await
        .unwrap()
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// POST /recordings with optional `question_id` and `file` parts
pub fn multipart_request(
    token: &str,
    question_id: Option<&str>,
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    if let Some(question_id) = question_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"question_id\"\r\n\r\n{question_id}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/recordings")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
