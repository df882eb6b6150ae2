//! Deletes guarded by foreign keys
//!
//! Statuses, labels and users are referenced by tasks through `ON DELETE
//! RESTRICT` foreign keys. Postgres refuses to delete a referenced row with
//! SQLSTATE `23503`; the model layer turns that refusal into
//! [`DeleteResult::Blocked`] instead of handing a storage error to the
//! caller.
//!
//! Every guarded delete runs in its own transaction. A blocked delete rolls
//! the transaction back, so the row and all of its associations stay
//! untouched.

use sqlx::{postgres::PgQueryResult, Postgres, Transaction};
use std::future::Future;
use tracing::{debug, warn};

use crate::auth::authorization::Outcome;
use crate::models::message::Notice;

/// Outcome of a delete that may be vetoed by dependent rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResult {
    /// The row and its direct associations were removed
    Deleted,

    /// Other rows still reference the target; nothing changed
    Blocked {
        /// Name of the foreign key constraint that refused the delete
        constraint: Option<String>,
    },

    /// No row with that id exists (already removed by a concurrent request)
    Missing,
}

impl DeleteResult {
    /// True when the row was removed
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteResult::Deleted)
    }

    /// True when dependents vetoed the delete
    pub fn is_blocked(&self) -> bool {
        matches!(self, DeleteResult::Blocked { .. })
    }
}

/// Returns the constraint name if `err` is a foreign key violation
///
/// The outer `Option` says whether the error is a violation at all; the
/// inner one carries the constraint name when Postgres reports it.
pub fn foreign_key_violation(err: &sqlx::Error) -> Option<Option<String>> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            Some(db_err.constraint().map(str::to_string))
        }
        _ => None,
    }
}

/// True if `err` is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Commits or rolls back a delete transaction depending on its outcome
///
/// `result` is the outcome of the final `DELETE` statement executed inside
/// `tx`. Foreign key violations become [`DeleteResult::Blocked`]; any other
/// database error is returned as is after rolling back.
pub async fn finish_delete(
    tx: Transaction<'_, Postgres>,
    result: Result<PgQueryResult, sqlx::Error>,
) -> Result<DeleteResult, sqlx::Error> {
    match result {
        Ok(done) if done.rows_affected() == 0 => {
            tx.rollback().await?;
            Ok(DeleteResult::Missing)
        }
        Ok(_) => {
            tx.commit().await?;
            Ok(DeleteResult::Deleted)
        }
        Err(err) => {
            tx.rollback().await?;
            match foreign_key_violation(&err) {
                Some(constraint) => {
                    debug!(constraint = ?constraint, "Delete blocked by dependent rows");
                    Ok(DeleteResult::Blocked { constraint })
                }
                None => Err(err),
            }
        }
    }
}

/// Wraps a guarded delete and decides where the caller goes next
///
/// `Deleted` leads to the success page with a success notice, `Blocked` to
/// the denial page with an error notice. `Missing` yields `None` so the
/// caller can answer with a plain not-found response. The guard never
/// retries: dependents have to be removed by other means first.
#[derive(Debug, Clone)]
pub struct ProtectedDelete {
    pub success_url: &'static str,
    pub success_message: &'static str,
    pub denied_url: &'static str,
    pub denied_message: &'static str,
}

impl ProtectedDelete {
    /// Runs `action` and maps its result
    pub async fn run<F, Fut>(&self, action: F) -> Result<Option<Outcome>, sqlx::Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DeleteResult, sqlx::Error>>,
    {
        let result = action().await?;
        Ok(self.resolve(result))
    }

    /// Maps an already computed delete result
    pub fn resolve(&self, result: DeleteResult) -> Option<Outcome> {
        match result {
            DeleteResult::Deleted => Some(Outcome::new(
                self.success_url,
                Notice::success(self.success_message),
            )),
            DeleteResult::Blocked { constraint } => {
                warn!(constraint = ?constraint, denied_url = self.denied_url, "Protected delete refused");
                Some(Outcome::new(
                    self.denied_url,
                    Notice::error(self.denied_message),
                ))
            }
            DeleteResult::Missing => None,
        }
    }
}
