//! Task endpoints
//!
//! Every route sits behind the authentication gate. The author of a new
//! task is always the caller; only the author may delete a task. The list
//! accepts filter criteria as query parameters:
//!
//! ```text
//! GET /tasks/?status=2&performer=5&labels=7&own_task=on
//! ```
//!
//! Empty parameters are ignored, populated ones combine with AND.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use taskmanager_shared::{
    auth::{
        authorization::{AccessCheck, AuthorOnly},
        caller::Caller,
    },
    db::deletion::DeleteResult,
    models::{
        label::Label,
        status::Status,
        task::{CreateTask, Task, TaskFilter, TaskListItem, UpdateTask},
        user::{User, UserSummary},
    },
};
use validator::Validate;

use crate::{
    app::AppState,
    error::{unique_as_field, ApiError, ApiResult, FormErrors, INVALID_CHOICE_MESSAGE, REQUIRED_MESSAGE},
    response::{Flash, Page},
    routes::forms::{parse_choice, DeleteContent},
};

pub const NAME_TAKEN_MESSAGE: &str = "Task with this Name already exists.";

/// Query string of the task list
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub performer: Option<String>,
    pub labels: Option<String>,
    pub own_task: Option<String>,
}

impl TaskListQuery {
    /// Builds the storage filter; `own_task` narrows to `caller_id`'s tasks
    pub fn to_filter(&self, caller_id: Option<i64>) -> ApiResult<TaskFilter> {
        let mut errors = FormErrors::default();

        let status_id = parse_choice("status", self.status.as_deref(), &mut errors);
        let performer_id = parse_choice("performer", self.performer.as_deref(), &mut errors);
        let label_id = parse_choice("labels", self.labels.as_deref(), &mut errors);
        errors.into_result()?;

        let own_only = self.own_task.as_deref().map(is_checked).unwrap_or(false);

        Ok(TaskFilter {
            status_id,
            performer_id,
            label_id,
            author_id: if own_only { caller_id } else { None },
        })
    }
}

/// Checkbox semantics
fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1")
}

/// Task form, as submitted
///
/// Parsed from raw pairs because `labels` is a multi-select and arrives as
/// repeated keys.
#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct TaskForm {
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub name: String,

    #[validate(length(max = 25500, message = "Ensure this value has at most 25500 characters."))]
    pub description: String,

    pub status: Option<String>,

    pub performer: Option<String>,

    pub labels: Vec<String>,
}

/// A task form whose values are well formed; references are not checked yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub name: String,
    pub description: String,
    pub status_id: i64,
    pub performer_id: Option<i64>,
    pub label_ids: Vec<i64>,
}

impl TaskForm {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = TaskForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "name" => form.name = value,
                "description" => form.description = value,
                "status" => form.status = Some(value),
                "performer" => form.performer = Some(value),
                "labels" => form.labels.push(value),
                _ => {}
            }
        }
        form
    }

    /// Checks presence, lengths and id syntax
    pub fn parse(&self) -> Result<TaskInput, FormErrors> {
        let cleaned = TaskForm {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            ..Default::default()
        };

        let mut errors = FormErrors::default();
        errors.required("name", &cleaned.name);
        errors.text("name", &cleaned.name);
        errors.text("description", &cleaned.description);
        errors.absorb(cleaned.validate());

        let status_id = parse_choice("status", self.status.as_deref(), &mut errors);
        if status_id.is_none() && !errors.has_field("status") {
            errors.add("status", REQUIRED_MESSAGE);
        }

        let performer_id = parse_choice("performer", self.performer.as_deref(), &mut errors);

        let mut label_ids = Vec::new();
        let mut label_errors = FormErrors::default();
        for raw in &self.labels {
            if let Some(id) = parse_choice("labels", Some(raw), &mut label_errors) {
                if !label_ids.contains(&id) {
                    label_ids.push(id);
                }
            }
        }
        if !label_errors.is_empty() {
            errors.add("labels", INVALID_CHOICE_MESSAGE);
        }

        match status_id {
            Some(status_id) if errors.is_empty() => Ok(TaskInput {
                name: cleaned.name,
                description: cleaned.description,
                status_id,
                performer_id,
                label_ids,
            }),
            _ => Err(errors),
        }
    }

    /// Full validation, including that every referenced row exists
    pub async fn clean(&self, db: &PgPool) -> ApiResult<TaskInput> {
        let input = self.parse().map_err(FormErrors::into_error)?;

        let mut errors = FormErrors::default();

        if !Status::exists(db, input.status_id).await? {
            errors.add("status", INVALID_CHOICE_MESSAGE);
        }

        if let Some(performer_id) = input.performer_id {
            if !User::exists(db, performer_id).await? {
                errors.add("performer", INVALID_CHOICE_MESSAGE);
            }
        }

        if !input.label_ids.is_empty() {
            let found = Label::count_existing(db, &input.label_ids).await?;
            if found != input.label_ids.len() as i64 {
                errors.add("labels", INVALID_CHOICE_MESSAGE);
            }
        }

        errors.into_result()?;
        Ok(input)
    }
}

/// Options offered by the task form and the filter
#[derive(Debug, Serialize)]
pub struct Choices {
    pub statuses: Vec<Status>,
    pub users: Vec<UserSummary>,
    pub labels: Vec<Label>,
}

impl Choices {
    async fn load(db: &PgPool) -> ApiResult<Self> {
        Ok(Self {
            statuses: Status::list(db).await?,
            users: User::list(db)
                .await?
                .into_iter()
                .map(UserSummary::from)
                .collect(),
            labels: Label::list(db).await?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListContent {
    pub filter: TaskListQuery,
    pub tasks: Vec<TaskListItem>,
    pub choices: Choices,
}

/// Values shown in the task form
#[derive(Debug, Default, Serialize)]
pub struct TaskFormValues {
    pub name: String,
    pub description: String,
    pub status: Option<i64>,
    pub performer: Option<i64>,
    pub labels: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskFormContent {
    pub action: String,
    pub form: TaskFormValues,
    pub choices: Choices,
}

#[derive(Debug, Serialize)]
pub struct TaskDetailContent {
    pub task: TaskListItem,
    pub labels: Vec<Label>,
}

async fn find_task(state: &AppState, id: i64) -> ApiResult<Task> {
    Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task", id))
}

/// `Some(redirect)` when the caller did not author `task`
fn deny_unless_author(caller: &Caller, task: &Task) -> Option<Response> {
    let denied = AuthorOnly.check(caller, task).into_result().err()?;
    tracing::warn!(
        caller_id = ?caller.user_id(),
        task_id = task.id,
        author_id = task.author_id,
        "Attempt to delete a task authored by someone else"
    );
    Some(Flash::from(denied).into_response())
}

/// `GET /tasks/`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Page<TaskListContent>> {
    let filter = query.to_filter(caller.user_id())?;
    tracing::debug!(?filter, "Listing tasks");

    let content = TaskListContent {
        tasks: Task::list(&state.db, &filter).await?,
        choices: Choices::load(&state.db).await?,
        filter: query,
    };

    Page::render(&state.db, &caller, "Tasks", content).await
}

/// `GET /tasks/create/`
pub async fn create_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<TaskFormContent>> {
    let content = TaskFormContent {
        action: "/tasks/create/".to_string(),
        form: TaskFormValues::default(),
        choices: Choices::load(&state.db).await?,
    };

    Page::render(&state.db, &caller, "Create task", content).await
}

/// `POST /tasks/create/`
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> ApiResult<Flash> {
    let author_id = caller
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Login required".to_string()))?;

    let input = TaskForm::from_pairs(pairs).clean(&state.db).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            name: input.name,
            description: input.description,
            status_id: input.status_id,
            author_id,
            performer_id: input.performer_id,
            label_ids: input.label_ids,
        },
    )
    .await
    .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?;

    tracing::info!(task_id = task.id, author_id, name = %task.name, "Task created");

    Ok(Flash::success("/tasks/", "Task successfully created"))
}

/// `GET /tasks/:id/`
pub async fn detail(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<TaskDetailContent>> {
    let task = Task::find_item(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task", id))?;
    let labels = Label::list_for_task(&state.db, id).await?;

    let title = format!("Task: {}", task.name);
    Page::render(&state.db, &caller, title, TaskDetailContent { task, labels }).await
}

/// `GET /tasks/:id/update/`
pub async fn update_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<TaskFormContent>> {
    let task = find_task(&state, id).await?;

    let content = TaskFormContent {
        action: format!("/tasks/{}/update/", id),
        form: TaskFormValues {
            labels: Task::label_ids(&state.db, id).await?,
            name: task.name,
            description: task.description,
            status: Some(task.status_id),
            performer: task.performer_id,
        },
        choices: Choices::load(&state.db).await?,
    };

    Page::render(&state.db, &caller, "Task modification", content).await
}

/// `POST /tasks/:id/update/`
///
/// Any logged-in user may edit any task; the author stays unchanged.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> ApiResult<Flash> {
    find_task(&state, id).await?;

    let input = TaskForm::from_pairs(pairs).clean(&state.db).await?;

    let task = Task::update(
        &state.db,
        id,
        UpdateTask {
            name: input.name,
            description: input.description,
            status_id: input.status_id,
            performer_id: input.performer_id,
            label_ids: input.label_ids,
        },
    )
    .await
    .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?
    .ok_or_else(|| ApiError::not_found("Task", id))?;

    tracing::info!(task_id = task.id, name = %task.name, "Task changed");

    Ok(Flash::success("/tasks/", "Task successfully changed"))
}

/// `GET /tasks/:id/delete/`
pub async fn delete_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let task = find_task(&state, id).await?;
    if let Some(denied) = deny_unless_author(&caller, &task) {
        return Ok(denied);
    }

    let content = DeleteContent {
        action: format!("/tasks/{}/delete/", id),
        object: task,
    };

    Ok(Page::render(&state.db, &caller, "Task deletion", content)
        .await?
        .into_response())
}

/// `POST /tasks/:id/delete/`
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let task = find_task(&state, id).await?;
    if let Some(denied) = deny_unless_author(&caller, &task) {
        return Ok(denied);
    }

    match Task::delete(&state.db, id).await? {
        DeleteResult::Deleted => {
            tracing::info!(task_id = id, "Task deleted");
            Ok(Flash::success("/tasks/", "Task successfully deleted").into_response())
        }
        DeleteResult::Missing => Err(ApiError::not_found("Task", id)),
        // Nothing references tasks with RESTRICT; label links cascade
        DeleteResult::Blocked { constraint } => Err(ApiError::Conflict(format!(
            "Task {} is still referenced ({})",
            id,
            constraint.unwrap_or_default()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fields(errors: FormErrors) -> Vec<String> {
        match errors.into_result() {
            Err(ApiError::ValidationError(details)) => {
                details.into_iter().map(|detail| detail.field).collect()
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_form_collects_repeated_labels() {
        let form = TaskForm::from_pairs(pairs(&[
            ("name", " T1 "),
            ("description", ""),
            ("status", "1"),
            ("performer", ""),
            ("labels", "3"),
            ("labels", "4"),
            ("labels", "3"),
            ("csrfmiddlewaretoken", "ignored"),
        ]));

        let input = form.parse().unwrap();
        assert_eq!(
            input,
            TaskInput {
                name: "T1".to_string(),
                description: String::new(),
                status_id: 1,
                performer_id: None,
                label_ids: vec![3, 4],
            }
        );
    }

    #[test]
    fn test_form_requires_name_and_status() {
        let errors = TaskForm::from_pairs(pairs(&[("description", "x")]))
            .parse()
            .unwrap_err();
        assert_eq!(fields(errors), vec!["name", "status"]);
    }

    #[test]
    fn test_form_rejects_malformed_ids() {
        let errors = TaskForm::from_pairs(pairs(&[
            ("name", "T1"),
            ("status", "new"),
            ("performer", "bob"),
            ("labels", "x"),
            ("labels", "y"),
        ]))
        .parse()
        .unwrap_err();

        assert_eq!(fields(errors), vec!["status", "performer", "labels"]);
    }

    #[test]
    fn test_form_limits_name_length() {
        let long_name = "n".repeat(256);
        let errors = TaskForm::from_pairs(pairs(&[("name", &long_name), ("status", "1")]))
            .parse()
            .unwrap_err();
        assert_eq!(fields(errors), vec!["name"]);
    }

    #[test]
    fn test_form_rejects_null_characters() {
        let errors = TaskForm::from_pairs(pairs(&[
            ("name", "T\01"),
            ("description", "line\0"),
            ("status", "1"),
        ]))
        .parse()
        .unwrap_err();
        assert_eq!(fields(errors), vec!["name", "description"]);
    }

    #[test]
    fn test_empty_query_is_empty_filter() {
        let filter = TaskListQuery::default().to_filter(Some(1)).unwrap();
        assert!(filter.is_empty());

        let query = TaskListQuery {
            status: Some(String::new()),
            performer: Some(String::new()),
            labels: Some(String::new()),
            own_task: None,
        };
        assert!(query.to_filter(Some(1)).unwrap().is_empty());
    }

    #[test]
    fn test_query_to_filter() {
        let query = TaskListQuery {
            status: Some("2".to_string()),
            performer: Some("5".to_string()),
            labels: Some("7".to_string()),
            own_task: Some("on".to_string()),
        };

        assert_eq!(
            query.to_filter(Some(9)).unwrap(),
            TaskFilter {
                status_id: Some(2),
                performer_id: Some(5),
                label_id: Some(7),
                author_id: Some(9),
            }
        );
    }

    #[test]
    fn test_own_task_unchecked() {
        let query = TaskListQuery {
            own_task: Some("false".to_string()),
            ..Default::default()
        };
        assert_eq!(query.to_filter(Some(9)).unwrap().author_id, None);
    }

    #[test]
    fn test_query_rejects_non_numeric_ids() {
        let query = TaskListQuery {
            status: Some("open".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.to_filter(Some(1)),
            Err(ApiError::ValidationError(_))
        ));
    }
}
