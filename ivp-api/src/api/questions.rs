//! Question endpoints
//!
//! GET/POST /questions, POST /questions/generate

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::ApiJson;
use crate::db::questions;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewQuestion, Question};
use crate::services::question_generator::{self, GenerateRequest, GenerateResponse};
use crate::AppState;

/// GET /questions
pub async fn list_questions(State(state): State<AppState>) -> ApiResult<Json<Vec<Question>>> {
    Ok(Json(questions::list_questions(&state.db).await?))
}

/// POST /questions
pub async fn create_question(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewQuestion>,
) -> ApiResult<Json<Question>> {
    let request = request.validated().map_err(ApiError::BadRequest)?;
    let question = questions::create_question(&state.db, &request).await?;
    Ok(Json(question))
}

/// POST /questions/generate
///
/// Template-driven; the generated questions are not stored.
pub async fn generate_questions(ApiJson(request): ApiJson<GenerateRequest>) -> ApiResult<Json<GenerateResponse>> {
    let response = question_generator::generate(&request).map_err(ApiError::BadRequest)?;

    tracing::debug!(
        questions = response.questions.len(),
        job_title = %response.job_title,
        "Generated interview questions"
    );

    Ok(Json(response))
}

pub fn question_routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/", get(list_questions).post(create_question))
        .route("/questions/generate", post(generate_questions))
}
