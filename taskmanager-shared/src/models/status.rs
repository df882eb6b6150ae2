//! Task status model
//!
//! Every task carries exactly one status. `tasks.status_id` is `ON DELETE
//! RESTRICT`, so a status in use cannot be deleted.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE statuses (
//!     id BIGSERIAL PRIMARY KEY,
//!     name VARCHAR(255) NOT NULL UNIQUE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::deletion::{finish_delete, DeleteResult};

/// A named task status ("new", "in progress", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub id: i64,

    /// Unique name
    pub name: String,

    pub created_at: DateTime<Utc>,
}

impl Status {
    /// Inserts a status; fails with a unique violation on a duplicate name
    pub async fn create(pool: &PgPool, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Status>(
            "INSERT INTO statuses (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Status>("SELECT id, name, created_at FROM statuses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Renames a status; `None` if it doesn't exist
    pub async fn update(pool: &PgPool, id: i64, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Status>(
            "UPDATE statuses SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a status unless a task still uses it
    pub async fn delete(pool: &PgPool, id: i64) -> Result<DeleteResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query("DELETE FROM statuses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await;

        finish_delete(tx, result).await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Status>("SELECT id, name, created_at FROM statuses ORDER BY id")
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM statuses")
            .fetch_one(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM statuses WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
