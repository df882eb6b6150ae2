//! Task model, label links and list filtering
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tasks (
//!     id BIGSERIAL PRIMARY KEY,
//!     name VARCHAR(255) NOT NULL UNIQUE,
//!     description TEXT NOT NULL DEFAULT '',
//!     status_id BIGINT NOT NULL REFERENCES statuses(id) ON DELETE RESTRICT,
//!     author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
//!     performer_id BIGINT REFERENCES users(id) ON DELETE RESTRICT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE task_labels (
//!     task_id BIGINT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
//!     label_id BIGINT NOT NULL REFERENCES labels(id) ON DELETE RESTRICT,
//!     PRIMARY KEY (task_id, label_id)
//! );
//! ```
//!
//! Creating or updating a task writes the task row and its label links in
//! one transaction.
//!
//! # Example
//!
//! ```no_run
//! use taskmanager_shared::models::task::{CreateTask, Task, TaskFilter};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool, author_id: i64, status_id: i64) -> Result<(), sqlx::Error> {
//! let task = Task::create(&pool, CreateTask {
//!     name: "T1".to_string(),
//!     description: String::new(),
//!     status_id,
//!     author_id,
//!     performer_id: None,
//!     label_ids: vec![],
//! }).await?;
//!
//! let mine = Task::list(&pool, &TaskFilter {
//!     author_id: Some(author_id),
//!     ..Default::default()
//! }).await?;
//! assert!(mine.iter().any(|t| t.id == task.id));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::deletion::{finish_delete, DeleteResult};

/// A task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,

    /// Unique name
    pub name: String,

    /// Free text, may be empty
    pub description: String,

    pub status_id: i64,

    /// Owner of the task; only the author may delete it
    pub author_id: i64,

    /// Optional assignee
    pub performer_id: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// A task joined with the names of its status, author and performer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskListItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status_id: i64,
    pub status_name: String,
    pub author_id: i64,
    pub author_name: String,
    pub performer_id: Option<i64>,
    pub performer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task
///
/// `author_id` always comes from the authenticated caller, never from the
/// submitted form.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub name: String,
    pub description: String,
    pub status_id: i64,
    pub author_id: i64,
    pub performer_id: Option<i64>,
    pub label_ids: Vec<i64>,
}

/// Full replacement of a task's editable fields
///
/// The author is not editable.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub name: String,
    pub description: String,
    pub status_id: i64,
    pub performer_id: Option<i64>,
    pub label_ids: Vec<i64>,
}

/// Criteria for the task list
///
/// Every populated field narrows the result; criteria combine with AND. An
/// empty filter returns every task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Exact match on status
    pub status_id: Option<i64>,

    /// Exact match on performer
    pub performer_id: Option<i64>,

    /// Task carries this label
    pub label_id: Option<i64>,

    /// Only tasks authored by this user ("only my own tasks")
    pub author_id: Option<i64>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self == &TaskFilter::default()
    }

    /// Appends one `AND` clause per populated criterion
    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(status_id) = self.status_id {
            builder.push(" AND t.status_id = ").push_bind(status_id);
        }
        if let Some(performer_id) = self.performer_id {
            builder.push(" AND t.performer_id = ").push_bind(performer_id);
        }
        if let Some(label_id) = self.label_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM task_labels tl WHERE tl.task_id = t.id AND tl.label_id = ")
                .push_bind(label_id)
                .push(")");
        }
        if let Some(author_id) = self.author_id {
            builder.push(" AND t.author_id = ").push_bind(author_id);
        }
    }
}

const TASK_COLUMNS: &str =
    "id, name, description, status_id, author_id, performer_id, created_at";

const LIST_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.created_at,
           t.status_id, s.name AS status_name,
           t.author_id, TRIM(a.first_name || ' ' || a.last_name) AS author_name,
           t.performer_id, TRIM(p.first_name || ' ' || p.last_name) AS performer_name
    FROM tasks t
    JOIN statuses s ON s.id = t.status_id
    JOIN users a ON a.id = t.author_id
    LEFT JOIN users p ON p.id = t.performer_id
    WHERE TRUE"#;

impl Task {
    /// Inserts a task and its label links
    ///
    /// # Errors
    ///
    /// Unique violation on a duplicate name; foreign key violation if the
    /// status, a user or a label vanished concurrently.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (name, description, status_id, author_id, performer_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.status_id)
        .bind(data.author_id)
        .bind(data.performer_id)
        .fetch_one(&mut *tx)
        .await?;

        link_labels(&mut tx, task.id, &data.label_ids).await?;

        tx.commit().await?;
        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Task with display names, for the detail page
    pub async fn find_item(pool: &PgPool, id: i64) -> Result<Option<TaskListItem>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(LIST_SELECT);
        builder.push(" AND t.id = ").push_bind(id);

        builder
            .build_query_as::<TaskListItem>()
            .fetch_optional(pool)
            .await
    }

    /// Replaces the editable fields and the label set of a task
    ///
    /// Returns `None` if the task doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET name = $2, description = $3, status_id = $4, performer_id = $5
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.status_id)
        .bind(data.performer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(task) = task else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM task_labels WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_labels(&mut tx, id, &data.label_ids).await?;

        tx.commit().await?;
        Ok(Some(task))
    }

    /// Deletes a task together with its label links
    pub async fn delete(pool: &PgPool, id: i64) -> Result<DeleteResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await;

        finish_delete(tx, result).await
    }

    /// Tasks matching `filter`, ordered by id
    pub async fn list(pool: &PgPool, filter: &TaskFilter) -> Result<Vec<TaskListItem>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(LIST_SELECT);
        filter.push_conditions(&mut builder);
        builder.push(" ORDER BY t.id");

        builder.build_query_as::<TaskListItem>().fetch_all(pool).await
    }

    /// Ids of the labels attached to a task
    pub async fn label_ids(pool: &PgPool, id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT label_id FROM task_labels WHERE task_id = $1 ORDER BY label_id")
            .bind(id)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(pool)
            .await
    }
}

async fn link_labels(
    tx: &mut Transaction<'_, Postgres>,
    task_id: i64,
    label_ids: &[i64],
) -> Result<(), sqlx::Error> {
    if label_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO task_labels (task_id, label_id)
        SELECT $1, label_id FROM UNNEST($2::BIGINT[]) AS label_id
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(task_id)
    .bind(label_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
