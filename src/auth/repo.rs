use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::UpdateProfileRequest;

const USER_COLUMNS: &str = "id, email, password_hash, google_id, name, height_cm, weight_kg, \
                            activity_level, deleted_at, created_at, updated_at";

/// User record in the database. A user has at least one of
/// `password_hash` or `google_id`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub deleted_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Find a non-deleted user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_google_id(db: &PgPool, google_id: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1 AND deleted_at IS NULL"
        ))
        .bind(google_id)
        .fetch_optional(db)
        .await
    }

    /// Load a non-deleted user by id. Soft-deleted users are invisible here,
    /// which is what fails authentication closed for them.
    pub async fn find_active(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: Option<&str>,
        google_id: Option<&str>,
        name: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, google_id, name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(google_id)
        .bind(name)
        .fetch_one(db)
        .await
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        payload: &UpdateProfileRequest,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 height_cm = COALESCE($3, height_cm), \
                 weight_kg = COALESCE($4, weight_kg), \
                 activity_level = COALESCE($5, activity_level), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(payload.name.as_deref())
        .bind(payload.height_cm)
        .bind(payload.weight_kg)
        .bind(payload.activity_level.as_deref())
        .fetch_optional(db)
        .await
    }

    pub async fn soft_delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Single active refresh token per user; the row is replaced on every
/// issue, which is what revokes the previous token.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl RefreshToken {
    pub async fn replace_for_user(
        db: &PgPool,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at, created_at = now()",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT user_id, token, expires_at, created_at \
             FROM refresh_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn delete_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(())
    }
}
