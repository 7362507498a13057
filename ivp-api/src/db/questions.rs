//! Question database operations

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{NewQuestion, Question, QuestionCategory};
use ivp_common::{time, Error, Result};

fn row_to_question(row: &SqliteRow) -> Result<Question> {
    let category: String = row.get("category");
    let category: QuestionCategory = category.parse().map_err(Error::Internal)?;

    let created_at: String = row.get("created_at");

    Ok(Question {
        id: row.get("id"),
        text: row.get("text"),
        category,
        job_title: row.get("job_title"),
        job_description: row.get("job_description"),
        is_generated: row.get::<i64, _>("is_generated") != 0,
        created_at: time::parse_stored("created_at", &created_at)?,
    })
}

/// Insert a validated question and return it with its assigned id
pub async fn create_question(pool: &SqlitePool, question: &NewQuestion) -> Result<Question> {
    let created_at = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO questions (text, category, job_title, job_description, is_generated, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&question.text)
    .bind(question.category.as_str())
    .bind(&question.job_title)
    .bind(&question.job_description)
    .bind(question.is_generated as i64)
    .bind(time::to_stored(&created_at))
    .execute(pool)
    .await?
    .last_insert_rowid();

    tracing::debug!(question_id = id, category = %question.category, "Question created");

    Ok(Question {
        id,
        text: question.text.clone(),
        category: question.category,
        job_title: question.job_title.clone(),
        job_description: question.job_description.clone(),
        is_generated: question.is_generated,
        created_at,
    })
}

/// All questions ordered by id
pub async fn list_questions(pool: &SqlitePool) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        r#"
        SELECT id, text, category, job_title, job_description, is_generated, created_at
        FROM questions
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_question).collect()
}

pub async fn question_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}
