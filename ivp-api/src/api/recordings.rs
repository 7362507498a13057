//! Recording endpoints
//!
//! GET /recordings, GET /recordings/:id, POST /recordings (multipart),
//! POST /recordings/:id/cancel. All are scoped to the authenticated caller.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::ApiPath;
use crate::error::{ApiError, ApiResult};
use crate::models::Recording;
use crate::workflow::Submission;
use crate::AppState;
use ivp_common::uuid_utils;

/// POST /recordings/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub recording_id: Uuid,
    pub status: String,
}

/// Multipart fields of a recording upload
struct Upload {
    question_id: i64,
    original_filename: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut question_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("question_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                let id = text.trim().parse::<i64>().map_err(|_| {
                    ApiError::BadRequest(format!("question_id must be an integer, got '{}'", text))
                })?;
                question_id = Some(id);
            }
            Some("file") => {
                let original_filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((original_filename, bytes.to_vec()));
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let question_id =
        question_id.ok_or_else(|| ApiError::BadRequest("Missing form field: question_id".to_string()))?;
    let (original_filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("Missing form field: file".to_string()))?;

    Ok(Upload {
        question_id,
        original_filename,
        bytes,
    })
}

/// GET /recordings
pub async fn list_recordings(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Recording>>> {
    Ok(Json(user.scope().list(&state.db).await?))
}

/// GET /recordings/:id
pub async fn get_recording(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(recording_id): ApiPath<Uuid>,
) -> ApiResult<Json<Recording>> {
    user.scope()
        .get(&state.db, recording_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recording {}", recording_id)))
}

/// POST /recordings
///
/// Runs the whole ingestion pipeline before responding. The pipeline runs in
/// its own task; if the client disconnects the drop guard fires the
/// submission's token and the task records the cancellation.
pub async fn create_recording(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<Recording>> {
    let upload = read_upload(multipart).await?;
    let recording_id = uuid_utils::generate();

    let token = state.shutdown.child_token();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(recording_id, token.clone());
    let guard = token.clone().drop_guard();

    let submission = Submission {
        recording_id,
        owner: user.0.id,
        question_id: upload.question_id,
        original_filename: upload.original_filename,
        bytes: upload.bytes,
    };

    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let result = task_state.pipeline.submit(submission, &token).await;
        task_state
            .cancellation_tokens
            .write()
            .await
            .remove(&recording_id);
        result
    });

    let result = task.await;
    guard.disarm();

    match result {
        Ok(Ok(recording)) => Ok(Json(recording)),
        Ok(Err(failure)) => {
            let err = ApiError::Ingestion(failure);
            if err.status_code().is_server_error() {
                *state.last_error.write().await = Some(err.to_string());
            }
            Err(err)
        }
        Err(join_err) => {
            // The task never reached its own cleanup
            state
                .cancellation_tokens
                .write()
                .await
                .remove(&recording_id);
            let message = format!("Ingestion task failed: {}", join_err);
            *state.last_error.write().await = Some(message.clone());
            Err(ApiError::Internal(message))
        }
    }
}

/// POST /recordings/:id/cancel
pub async fn cancel_recording(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(recording_id): ApiPath<Uuid>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    if user.scope().get(&state.db, recording_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Recording {}", recording_id)));
    }

    let token = state
        .cancellation_tokens
        .read()
        .await
        .get(&recording_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("No in-flight submission for recording {}", recording_id)))?;

    token.cancel();
    tracing::info!(recording_id = %recording_id, user_id = %user.0.id, "Submission cancellation requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            recording_id,
            status: "cancelling".to_string(),
        }),
    ))
}

/// Recording routes; uploads may be up to `max_upload_bytes`
pub fn recording_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/recordings", get(list_recordings).post(create_recording))
        .route("/recordings/", get(list_recordings).post(create_recording))
        .route("/recordings/:id", get(get_recording))
        .route("/recordings/:id/cancel", post(cancel_recording))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
