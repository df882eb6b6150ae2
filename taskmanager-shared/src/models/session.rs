//! Server-side sessions
//!
//! A session exists for every browser that has been handed a `sessionid`
//! cookie. Anonymous sessions (no `user_id`) are created on demand so that a
//! notification can be queued for a caller who is not logged in, e.g. the
//! "please log in" message shown on the login page.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE sessions (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     token_hash CHAR(64) NOT NULL UNIQUE,
//!     user_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     expires_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::session_token::{generate_token, hash_token, is_well_formed};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,

    /// Logged-in user, `None` for anonymous sessions
    pub user_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Starts a session and returns it with its plaintext cookie token
    pub async fn create(
        pool: &PgPool,
        user_id: Option<i64>,
        ttl: Duration,
    ) -> Result<(Self, String), sqlx::Error> {
        let (token, token_hash) = generate_token();

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(Utc::now() + ttl)
        .fetch_one(pool)
        .await?;

        Ok((session, token))
    }

    /// Looks up a live session by its cookie token
    ///
    /// Malformed and expired tokens yield `None`.
    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        if !is_well_formed(token) {
            return Ok(None);
        }

        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await
    }

    /// Issues a fresh token for an existing session and binds it to `user_id`
    ///
    /// Used on login: the old cookie stops working while queued messages
    /// survive. Returns `None` if the session vanished in the meantime.
    pub async fn rotate(
        pool: &PgPool,
        id: Uuid,
        user_id: Option<i64>,
        ttl: Duration,
    ) -> Result<Option<(Self, String)>, sqlx::Error> {
        let (token, token_hash) = generate_token();

        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET token_hash = $2, user_id = $3, expires_at = $4
            WHERE id = $1
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(user_id)
        .bind(Utc::now() + ttl)
        .fetch_optional(pool)
        .await?;

        Ok(session.map(|session| (session, token)))
    }

    /// Ends a session; its queued messages go with it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes expired sessions, returning how many were dropped
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
