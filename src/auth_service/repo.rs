//! Persistence for user credentials and refresh tokens.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::auth::UserRole;
use crate::db::DbPool;
use crate::error::AppResult;

use super::models::UserAuth;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, active, locked, \
                            failed_attempts, last_login_at, created_at";

pub async fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserAuth>> {
    let user = sqlx::query_as::<_, UserAuth>(&format!(
        "SELECT {} FROM user_auth WHERE LOWER(email) = LOWER($1)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<UserAuth>> {
    let user = sqlx::query_as::<_, UserAuth>(&format!(
        "SELECT {} FROM user_auth WHERE LOWER(username) = LOWER($1)",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, id: Uuid) -> AppResult<Option<UserAuth>> {
    let user = sqlx::query_as::<_, UserAuth>(&format!(
        "SELECT {} FROM user_auth WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn insert_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: UserRole,
) -> AppResult<UserAuth> {
    let user = sqlx::query_as::<_, UserAuth>(&format!(
        "INSERT INTO user_auth (username, email, password_hash, role) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn record_failed_attempt(
    pool: &DbPool,
    id: Uuid,
    max_attempts: i32,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE user_auth \
         SET failed_attempts = failed_attempts + 1, \
             locked = (failed_attempts + 1 >= $2) OR locked \
         WHERE id = $1",
    )
    .bind(id)
    .bind(max_attempts)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_successful_login(pool: &DbPool, id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE user_auth \
         SET failed_attempts = 0, locked = FALSE, last_login_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

// ============================================================================
// Refresh tokens
// ============================================================================

pub async fn insert_refresh_token(
    pool: &DbPool,
    token: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(token)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically consume a refresh token for rotation.
///
/// The conditional UPDATE is the single point of contention: two concurrent
/// refreshes of the same token race on it and exactly one sees a row come
/// back. Returns the owning user id, or None if the token is unknown,
/// already revoked or expired.
pub async fn consume_refresh_token(
    tx: &mut Transaction<'_, Postgres>,
    token: &str,
) -> AppResult<Option<Uuid>> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        "UPDATE refresh_tokens \
         SET revoked = TRUE \
         WHERE token = $1 AND revoked = FALSE AND expires_at > NOW() \
         RETURNING user_id",
    )
    .bind(token)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(user_id)
}

pub async fn insert_refresh_token_tx(
    tx: &mut Transaction<'_, Postgres>,
    token: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(token)
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Revoke a refresh token if it exists. No-op for unknown tokens so logout
/// stays idempotent.
pub async fn revoke_refresh_token(pool: &DbPool, token: &str) -> AppResult<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke every live refresh token a user holds. Used when an account is
/// deleted or force-logged-out from all devices.
pub async fn revoke_all_for_user(pool: &DbPool, user_id: Uuid) -> AppResult<u64> {
    let result =
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
