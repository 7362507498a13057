//! Vendor HTTP client tests against local stub servers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ivp_api::services::{
    AssemblyAiClient, FeedbackError, FeedbackGenerator, FeedbackSettings, OpenAiFeedbackClient,
    Transcriber, TranscriptionError, TranscriptionSettings, UploadHandle,
};

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Transcription vendor
// ============================================================================

#[derive(Default)]
struct TranscriptionStub {
    upload_calls: usize,
    /// Statuses returned by the next uploads before one succeeds
    upload_failures: VecDeque<u16>,
    uploads: Vec<Vec<u8>>,
    auth_headers: Vec<String>,
    submitted_audio_urls: Vec<String>,
    /// Job bodies returned by successive polls; "processing" once exhausted
    polls: VecDeque<Value>,
    /// Never answer job polls
    hang_polls: bool,
    deleted: Vec<String>,
}

type Shared<T> = Arc<Mutex<T>>;

async fn stub_upload(
    State(stub): State<Shared<TranscriptionStub>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut stub = stub.lock().unwrap();
    stub.upload_calls += 1;
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        stub.auth_headers.push(auth.to_string());
    }
    if let Some(status) = stub.upload_failures.pop_front() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "stub upload failure").into_response();
    }
    stub.uploads.push(body.to_vec());
    Json(json!({"upload_url": "https://cdn.stub/audio/abc"})).into_response()
}

async fn stub_submit(State(stub): State<Shared<TranscriptionStub>>, Json(body): Json<Value>) -> Json<Value> {
    let mut stub = stub.lock().unwrap();
    if let Some(url) = body["audio_url"].as_str() {
        stub.submitted_audio_urls.push(url.to_string());
    }
    Json(json!({"id": "job-1", "status": "queued"}))
}

async fn stub_poll(State(stub): State<Shared<TranscriptionStub>>, Path(_id): Path<String>) -> Json<Value> {
    let hang = stub.lock().unwrap().hang_polls;
    if hang {
        std::future::pending::<()>().await;
    }
    let mut stub = stub.lock().unwrap();
    Json(
        stub.polls
            .pop_front()
            .unwrap_or_else(|| json!({"id": "job-1", "status": "processing"})),
    )
}

async fn stub_delete(State(stub): State<Shared<TranscriptionStub>>, Path(id): Path<String>) -> StatusCode {
    stub.lock().unwrap().deleted.push(id);
    StatusCode::OK
}

async fn transcription_vendor(stub: TranscriptionStub) -> (String, Shared<TranscriptionStub>) {
    let stub = Arc::new(Mutex::new(stub));
    let router = Router::new()
        .route("/v2/upload", post(stub_upload))
        .route("/v2/transcript", post(stub_submit))
        .route("/v2/transcript/:id", get(stub_poll).delete(stub_delete))
        .with_state(stub.clone());
    (spawn_stub(router).await, stub)
}

fn transcription_settings(base_url: &str, max_wait: Duration) -> TranscriptionSettings {
    TranscriptionSettings {
        base_url: base_url.to_string(),
        api_key: "aai-test-key".to_string(),
        poll_interval: Duration::from_millis(10),
        max_wait,
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
    }
}

fn handle() -> UploadHandle {
    UploadHandle {
        upload_url: "https://cdn.stub/audio/abc".to_string(),
    }
}

#[tokio::test]
async fn test_transcription_happy_path() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        polls: VecDeque::from([
            json!({"id": "job-1", "status": "queued"}),
            json!({"id": "job-1", "status": "processing"}),
            json!({"id": "job-1", "status": "completed", "text": "Hello there.", "audio_duration": 7.25}),
        ]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let uploaded = client.upload(b"raw audio").await.unwrap();
    let transcript = client
        .transcribe(&uploaded, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(transcript.text, "Hello there.");
    assert_eq!(transcript.audio_duration, Some(7.25));

    let stub = stub.lock().unwrap();
    assert_eq!(stub.uploads, vec![b"raw audio".to_vec()]);
    assert_eq!(stub.auth_headers, vec!["aai-test-key".to_string()]);
    assert_eq!(stub.submitted_audio_urls, vec![uploaded.upload_url.clone()]);
    assert!(stub.deleted.is_empty());
}

#[tokio::test]
async fn test_transcription_job_error_reported() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        polls: VecDeque::from([json!({"id": "job-1", "status": "error", "error": "file does not contain audio"})]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let err = client
        .transcribe(&handle(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        TranscriptionError::JobFailed(reason) => assert_eq!(reason, "file does not contain audio"),
        other => panic!("expected JobFailed, got {:?}", other),
    }
    assert!(stub.lock().unwrap().deleted.is_empty());
}

#[tokio::test]
async fn test_transcription_unknown_status_is_malformed() {
    let (base_url, _stub) = transcription_vendor(TranscriptionStub {
        polls: VecDeque::from([json!({"id": "job-1", "status": "paused"})]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let err = client
        .transcribe(&handle(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::Malformed(_)));
}

#[tokio::test]
async fn test_transcription_timeout_deletes_job() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub::default()).await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_millis(60))).unwrap();

    let err = client
        .transcribe(&handle(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        TranscriptionError::Timeout { waited } => assert!(waited >= Duration::from_millis(60)),
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(stub.lock().unwrap().deleted, vec!["job-1".to_string()]);
}

#[tokio::test]
async fn test_transcription_hung_poll_times_out_and_deletes_job() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        hang_polls: true,
        ..Default::default()
    })
    .await;
    let mut settings = transcription_settings(&base_url, Duration::from_millis(300));
    settings.max_attempts = 1;
    let client = AssemblyAiClient::new(settings).unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.transcribe(&handle(), &CancellationToken::new()),
    )
    .await
    .expect("max_wait should bound a poll that never answers")
    .unwrap_err();

    match err {
        TranscriptionError::Timeout { waited } => {
            assert!(waited >= Duration::from_millis(300));
            assert!(waited < Duration::from_secs(5));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(stub.lock().unwrap().deleted, vec!["job-1".to_string()]);
}

#[tokio::test]
async fn test_transcription_cancel_deletes_job() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub::default()).await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(30))).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), client.transcribe(&handle(), &cancel))
        .await
        .expect("cancellation should end the poll loop")
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::Cancelled));
    assert_eq!(stub.lock().unwrap().deleted, vec!["job-1".to_string()]);
}

#[tokio::test]
async fn test_upload_retries_server_errors() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        upload_failures: VecDeque::from([500, 429]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let uploaded = client.upload(b"audio").await.unwrap();

    assert_eq!(uploaded.upload_url, "https://cdn.stub/audio/abc");
    assert_eq!(stub.lock().unwrap().upload_calls, 3);
}

#[tokio::test]
async fn test_upload_does_not_retry_auth_failure() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        upload_failures: VecDeque::from([401]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let err = client.upload(b"audio").await.unwrap_err();

    assert!(matches!(err, TranscriptionError::Vendor { status: 401, .. }));
    assert_eq!(stub.lock().unwrap().upload_calls, 1);
}

#[tokio::test]
async fn test_upload_gives_up_after_max_attempts() {
    let (base_url, stub) = transcription_vendor(TranscriptionStub {
        upload_failures: VecDeque::from([503, 503, 503, 503]),
        ..Default::default()
    })
    .await;
    let client = AssemblyAiClient::new(transcription_settings(&base_url, Duration::from_secs(5))).unwrap();

    let err = client.upload(b"audio").await.unwrap_err();

    assert!(matches!(err, TranscriptionError::Vendor { status: 503, .. }));
    assert_eq!(stub.lock().unwrap().upload_calls, 3);
}

#[tokio::test]
async fn test_unreachable_vendor_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut settings = transcription_settings(&base_url, Duration::from_secs(5));
    settings.max_attempts = 1;
    let client = AssemblyAiClient::new(settings).unwrap();

    let err = client.upload(b"audio").await.unwrap_err();
    assert!(matches!(err, TranscriptionError::Transport(_)));
}

// ============================================================================
// Feedback vendor
// ============================================================================

#[derive(Default)]
struct ChatStub {
    calls: usize,
    /// (status, body) per call; content of a 200 is wrapped in a chat reply
    replies: VecDeque<(u16, String)>,
    requests: Vec<Value>,
    auth_headers: Vec<String>,
}

async fn stub_chat(
    State(stub): State<Shared<ChatStub>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let mut stub = stub.lock().unwrap();
    stub.calls += 1;
    stub.requests.push(request);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        stub.auth_headers.push(auth.to_string());
    }

    let (status, body) = stub
        .replies
        .pop_front()
        .unwrap_or((500, "no reply scripted".to_string()));
    if status != 200 {
        return (StatusCode::from_u16(status).unwrap(), body).into_response();
    }
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": body}}]
    }))
    .into_response()
}

async fn chat_vendor(replies: Vec<(u16, String)>) -> (String, Shared<ChatStub>) {
    let stub = Arc::new(Mutex::new(ChatStub {
        replies: replies.into(),
        ..Default::default()
    }));
    let router = Router::new()
        .route("/v1/chat/completions", post(stub_chat))
        .with_state(stub.clone());
    (spawn_stub(router).await, stub)
}

fn feedback_settings(base_url: &str) -> FeedbackSettings {
    FeedbackSettings {
        base_url: base_url.to_string(),
        api_key: "sk-test".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: 0.2,
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
    }
}

const FEEDBACK_JSON: &str = r#"{
    "Clarity": "Clear.",
    "Structure": "AVERAGE: no summary.",
    "Tone": "Confident.",
    "Language": "Vague verbs.",
    "Suggested improvements": "Quantify the impact."
}"#;

#[tokio::test]
async fn test_feedback_decodes_fenced_reply() {
    let (base_url, stub) = chat_vendor(vec![(200, format!("```json\n{}\n```", FEEDBACK_JSON))]).await;
    let client = OpenAiFeedbackClient::new(feedback_settings(&base_url)).unwrap();

    let feedback = client.generate("We cut latency by half.").await.unwrap();

    assert_eq!(feedback.structure, "AVERAGE: no summary.");
    assert_eq!(feedback.suggested_improvements, "Quantify the impact.");

    let stub = stub.lock().unwrap();
    assert_eq!(stub.auth_headers, vec!["Bearer sk-test".to_string()]);
    let request = &stub.requests[0];
    assert_eq!(request["model"], "gpt-4o-mini");
    let prompt = request["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("We cut latency by half."));
}

#[tokio::test]
async fn test_feedback_missing_key_is_malformed_and_not_retried() {
    let (base_url, stub) = chat_vendor(vec![(200, r#"{"Clarity": "ok"}"#.to_string())]).await;
    let client = OpenAiFeedbackClient::new(feedback_settings(&base_url)).unwrap();

    let err = client.generate("answer").await.unwrap_err();

    assert!(matches!(err, FeedbackError::Malformed(_)));
    assert_eq!(stub.lock().unwrap().calls, 1);
}

#[tokio::test]
async fn test_feedback_prose_reply_is_malformed() {
    let (base_url, _stub) = chat_vendor(vec![(200, "Overall a decent answer.".to_string())]).await;
    let client = OpenAiFeedbackClient::new(feedback_settings(&base_url)).unwrap();

    let err = client.generate("answer").await.unwrap_err();
    assert!(matches!(err, FeedbackError::Malformed(_)));
}

#[tokio::test]
async fn test_feedback_retries_unavailable_vendor() {
    let (base_url, stub) = chat_vendor(vec![
        (503, "overloaded".to_string()),
        (200, FEEDBACK_JSON.to_string()),
    ])
    .await;
    let client = OpenAiFeedbackClient::new(feedback_settings(&base_url)).unwrap();

    let feedback = client.generate("answer").await.unwrap();

    assert_eq!(feedback.clarity, "Clear.");
    assert_eq!(stub.lock().unwrap().calls, 2);
}

#[tokio::test]
async fn test_feedback_client_error_not_retried() {
    let (base_url, stub) = chat_vendor(vec![(400, "bad model".to_string())]).await;
    let client = OpenAiFeedbackClient::new(feedback_settings(&base_url)).unwrap();

    let err = client.generate("answer").await.unwrap_err();

    match err {
        FeedbackError::Vendor { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad model");
        }
        other => panic!("expected Vendor, got {:?}", other),
    }
    assert_eq!(stub.lock().unwrap().calls, 1);
}
