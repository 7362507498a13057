//! Recording database operations
//!
//! Every read and write goes through an [`OwnerScope`], so a recording can
//! only be seen or changed on behalf of the user who owns it.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Feedback, FailureReason, Recording, RecordingStatus};
use ivp_common::{time, uuid_utils, Error, Result};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, question_id, recording_url, created_at, updated_at,
           transcript, duration_seconds, feedback_json, status, failure_reason
    FROM recordings
"#;

/// Recording access restricted to one owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    owner: Uuid,
}

impl OwnerScope {
    pub fn new(owner: Uuid) -> Self {
        Self { owner }
    }

    fn check_owner(&self, recording: &Recording) -> Result<()> {
        if recording.user_id != self.owner {
            return Err(Error::Internal(format!(
                "Recording {} does not belong to user {}",
                recording.id, self.owner
            )));
        }
        Ok(())
    }

    /// Owner's recordings, newest first
    pub async fn list(&self, pool: &SqlitePool) -> Result<Vec<Recording>> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, id",
            SELECT_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_recording).collect()
    }

    /// One recording; `None` when missing or owned by someone else
    pub async fn get(&self, pool: &SqlitePool, id: Uuid) -> Result<Option<Recording>> {
        let row = sqlx::query(&format!("{} WHERE id = ? AND user_id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .bind(self.owner.to_string())
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(row_to_recording).transpose()
    }

    /// Insert a new recording row (committed on its own)
    pub async fn insert(&self, pool: &SqlitePool, recording: &Recording) -> Result<()> {
        self.check_owner(recording)?;
        let feedback_json = encode_feedback(recording.feedback_json.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO recordings (
                id, user_id, question_id, recording_url, created_at, updated_at,
                transcript, duration_seconds, feedback_json, status, failure_reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(recording.id.to_string())
        .bind(recording.user_id.to_string())
        .bind(recording.question_id)
        .bind(&recording.recording_url)
        .bind(time::to_stored(&recording.created_at))
        .bind(time::to_stored(&recording.updated_at))
        .bind(&recording.transcript)
        .bind(recording.duration_seconds)
        .bind(feedback_json)
        .bind(recording.status.as_str())
        .bind(recording.failure_reason.map(|r| r.as_str()))
        .execute(pool)
        .await?;

        tracing::debug!(
            recording_id = %recording.id,
            status = %recording.status,
            "Recording inserted"
        );

        Ok(())
    }

    /// Persist the mutable fields of an existing recording
    pub async fn save(&self, pool: &SqlitePool, recording: &Recording) -> Result<()> {
        self.check_owner(recording)?;
        let feedback_json = encode_feedback(recording.feedback_json.as_ref())?;

        let affected = sqlx::query(
            r#"
            UPDATE recordings
            SET transcript = ?, duration_seconds = ?, feedback_json = ?,
                status = ?, failure_reason = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&recording.transcript)
        .bind(recording.duration_seconds)
        .bind(feedback_json)
        .bind(recording.status.as_str())
        .bind(recording.failure_reason.map(|r| r.as_str()))
        .bind(time::to_stored(&recording.updated_at))
        .bind(recording.id.to_string())
        .bind(self.owner.to_string())
        .execute(pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(Error::NotFound(format!("Recording {}", recording.id)));
        }

        tracing::debug!(
            recording_id = %recording.id,
            status = %recording.status,
            "Recording saved"
        );

        Ok(())
    }
}

fn encode_feedback(feedback: Option<&Feedback>) -> Result<Option<String>> {
    feedback
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize feedback: {}", e)))
}

fn row_to_recording(row: &SqliteRow) -> Result<Recording> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let feedback_json: Option<String> = row.get("feedback_json");
    let feedback_json = feedback_json
        .map(|s| serde_json::from_str::<Feedback>(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize feedback_json: {}", e)))?;

    let status: String = row.get("status");
    let status: RecordingStatus = status.parse().map_err(Error::Internal)?;

    let failure_reason: Option<String> = row.get("failure_reason");
    let failure_reason = failure_reason
        .map(|s| s.parse::<FailureReason>())
        .transpose()
        .map_err(Error::Internal)?;

    Ok(Recording {
        id: uuid_utils::parse_stored("id", &id)?,
        user_id: uuid_utils::parse_stored("user_id", &user_id)?,
        question_id: row.get("question_id"),
        recording_url: row.get("recording_url"),
        created_at: time::parse_stored("created_at", &created_at)?,
        updated_at: time::parse_stored("updated_at", &updated_at)?,
        transcript: row.get("transcript"),
        duration_seconds: row.get("duration_seconds"),
        feedback_json,
        status,
        failure_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{questions, users};
    use crate::models::{NewQuestion, QuestionCategory, User};
    use chrono::Duration;
    use ivp_common::db::init_memory_database;

    async fn seed(pool: &SqlitePool, email: &str) -> (Uuid, i64) {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: email.split('@').next().unwrap().to_string(),
            hashed_password: "hash".to_string(),
            is_active: true,
            created_at: time::now(),
        };
        users::create_user(pool, &user).await.unwrap();

        let question = questions::create_question(
            pool,
            &NewQuestion {
                text: "Explain borrowing.".to_string(),
                category: QuestionCategory::Technical,
                job_title: None,
                job_description: None,
                is_generated: false,
            },
        )
        .await
        .unwrap();

        (user.id, question.id)
    }

    fn recording(owner: Uuid, question_id: i64) -> Recording {
        let mut r = Recording::new(
            Uuid::new_v4(),
            owner,
            question_id,
            "uploads/x.wav".to_string(),
            time::now(),
        );
        r.transition_to(RecordingStatus::Transcribing);
        r
    }

    #[tokio::test]
    async fn test_insert_get_and_save_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let (owner, question_id) = seed(&pool, "ada@example.com").await;
        let scope = OwnerScope::new(owner);

        let mut rec = recording(owner, question_id);
        scope.insert(&pool, &rec).await.unwrap();

        let stored = scope.get(&pool, rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordingStatus::Transcribing);
        assert!(stored.transcript.is_none());

        rec.attach_transcript("Borrowing lets you...".to_string(), Some(31.5));
        rec.transition_to(RecordingStatus::GeneratingFeedback);
        scope.save(&pool, &rec).await.unwrap();

        let stored = scope.get(&pool, rec.id).await.unwrap().unwrap();
        assert_eq!(stored.transcript.as_deref(), Some("Borrowing lets you..."));
        assert_eq!(stored.duration_seconds, Some(31.5));
        assert_eq!(stored.status, RecordingStatus::GeneratingFeedback);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_see_recording() {
        let pool = init_memory_database().await.unwrap();
        let (ada, question_id) = seed(&pool, "ada@example.com").await;
        let (bob, _) = seed(&pool, "bob@example.com").await;

        let rec = recording(ada, question_id);
        OwnerScope::new(ada).insert(&pool, &rec).await.unwrap();

        let bob_scope = OwnerScope::new(bob);
        assert!(bob_scope.get(&pool, rec.id).await.unwrap().is_none());
        assert!(bob_scope.list(&pool).await.unwrap().is_empty());
        assert!(bob_scope.insert(&pool, &rec).await.is_err());
        assert!(bob_scope.save(&pool, &rec).await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let pool = init_memory_database().await.unwrap();
        let (owner, question_id) = seed(&pool, "ada@example.com").await;
        let scope = OwnerScope::new(owner);

        let mut older = recording(owner, question_id);
        older.created_at = older.created_at - Duration::minutes(5);
        let newer = recording(owner, question_id);
        scope.insert(&pool, &older).await.unwrap();
        scope.insert(&pool, &newer).await.unwrap();

        let listed = scope.list(&pool).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn test_feedback_without_transcript_rejected_by_schema() {
        let pool = init_memory_database().await.unwrap();
        let (owner, question_id) = seed(&pool, "ada@example.com").await;

        let mut rec = recording(owner, question_id);
        rec.feedback_json = Some(Feedback {
            clarity: "a".to_string(),
            structure: "b".to_string(),
            tone: "c".to_string(),
            language: "d".to_string(),
            suggested_improvements: "e".to_string(),
        });
        assert!(OwnerScope::new(owner).insert(&pool, &rec).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_question_rejected_by_foreign_key() {
        let pool = init_memory_database().await.unwrap();
        let (owner, question_id) = seed(&pool, "ada@example.com").await;

        let rec = recording(owner, question_id + 999);
        assert!(OwnerScope::new(owner).insert(&pool, &rec).await.is_err());
    }
}
