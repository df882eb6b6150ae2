//! One-shot notification messages
//!
//! A message is queued against the caller's session by a redirecting
//! handler and consumed by the very next rendered page: [`Message::take_all`]
//! deletes the rows it returns, so each message is shown exactly once.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE session_messages (
//!     id BIGSERIAL PRIMARY KEY,
//!     session_id UUID NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
//!     level VARCHAR(16) NOT NULL,
//!     message TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// A mutation went through
    Success,

    /// Neutral information (e.g. logged out)
    Info,

    /// A request was refused
    Error,
}

impl Level {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Level::Success),
            "info" => Ok(Level::Info),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown message level: {}", other)),
        }
    }
}

/// A notification waiting to be shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Storage for session messages
pub struct Message;

impl Message {
    /// Queues a notice for the given session
    pub async fn push(pool: &PgPool, session_id: Uuid, notice: &Notice) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO session_messages (session_id, level, message)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_id)
        .bind(notice.level.as_str())
        .bind(&notice.message)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Removes and returns every queued notice, oldest first
    pub async fn take_all(pool: &PgPool, session_id: Uuid) -> Result<Vec<Notice>, sqlx::Error> {
        let mut rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            DELETE FROM session_messages
            WHERE session_id = $1
            RETURNING id, level, message
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;

        // RETURNING has no ORDER BY
        rows.sort_by_key(|(id, _, _)| *id);

        rows.into_iter()
            .map(|(_, level, message)| {
                let level = level
                    .parse::<Level>()
                    .map_err(|e| sqlx::Error::Decode(e.into()))?;
                Ok(Notice { level, message })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trips_through_str() {
        for level in [Level::Success, Level::Info, Level::Error] {
            assert_eq!(level.as_str().parse::<Level>(), Ok(level));
        }
        assert!("warning".parse::<Level>().is_err());
    }

    #[test]
    fn test_notice_constructors() {
        assert_eq!(Notice::error("no").level, Level::Error);
        assert_eq!(Notice::info("hi").level, Level::Info);

        let notice = Notice::success("Status successfully created");
        assert_eq!(notice.level, Level::Success);
        assert_eq!(notice.message, "Status successfully created");
    }

    #[test]
    fn test_notice_serializes_lowercase_level() {
        let json = serde_json::to_value(Notice::error("denied")).unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["message"], "denied");
    }
}
