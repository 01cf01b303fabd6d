//! Refresh token storage. Only SHA-256 hashes of the tokens are kept.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::Session;

/// Store a new session for `session.user_id` under `token_hash`.
pub async fn insert_session<'e, E>(
    executor: E,
    token_hash: &str,
    session: &Session,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO refresh_tokens (token_hash, user_id, expires_at, device_info, ip_address)
            VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(token_hash)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.device_info.as_deref())
    .bind(session.ip_address.as_deref())
    .execute(executor)
    .await?;

    Ok(())
}

/// Delete the session stored under `token_hash` and return it.
///
/// The delete is the claim: when two requests race on the same token only one
/// of them gets the row back. Expired sessions are returned too so the caller
/// can tell "expired" from "unknown".
pub async fn take_session<'e, E>(
    executor: E,
    token_hash: &str,
) -> Result<Option<Session>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING user_id, expires_at, device_info, ip_address
        "#,
    )
    .bind(token_hash)
    .fetch_optional(executor)
    .await
}

/// Delete every session that expired before `now`, returning how many went.
pub async fn purge_expired_sessions<'e, E>(
    executor: E,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Number of live sessions a user holds
pub async fn count_sessions<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND expires_at > NOW()")
        .bind(user_id)
        .fetch_one(executor)
        .await
}
