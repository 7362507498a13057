//! User database operations

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::User;
use ivp_common::{time, uuid_utils, Error, Result};

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");

    Ok(User {
        id: uuid_utils::parse_stored("id", &id)?,
        email: row.get("email"),
        username: row.get("username"),
        hashed_password: row.get("hashed_password"),
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: time::parse_stored("created_at", &created_at)?,
    })
}

/// Insert a user; duplicate email or username is a `Conflict`
pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, username, hashed_password, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.hashed_password)
    .bind(user.is_active as i64)
    .bind(time::to_stored(&user.created_at))
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(user_id = %user.id, "User registered");
            Ok(())
        }
        Err(e) => {
            let err = Error::Database(e);
            if err.is_unique_violation() {
                Err(Error::Conflict(
                    "A user with this email or username already exists".to_string(),
                ))
            } else {
                Err(err)
            }
        }
    }
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, username, hashed_password, is_active, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, username, hashed_password, is_active, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}
