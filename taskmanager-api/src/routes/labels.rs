//! Label endpoints
//!
//! Gated like statuses. A label attached to any task cannot be deleted.

use axum::{
    extract::{Path, State},
    Extension, Form,
};
use serde::Serialize;
use taskmanager_shared::{
    auth::caller::Caller,
    db::deletion::ProtectedDelete,
    models::label::Label,
};

use crate::{
    app::AppState,
    error::{unique_as_field, ApiError, ApiResult},
    response::{Flash, Page},
    routes::forms::{DeleteContent, FormContent, NameForm},
};

pub const NAME_TAKEN_MESSAGE: &str = "Label with this Name already exists.";

const DELETE_GUARD: ProtectedDelete = ProtectedDelete {
    success_url: "/labels/",
    success_message: "Label is successfully deleted",
    denied_url: "/labels/",
    denied_message: "Can't delete a label because it's related with task",
};

#[derive(Debug, Serialize)]
pub struct LabelListContent {
    pub labels: Vec<Label>,
}

async fn find_label(state: &AppState, id: i64) -> ApiResult<Label> {
    Label::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Label", id))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<LabelListContent>> {
    let labels = Label::list(&state.db).await?;
    Page::render(&state.db, &caller, "Labels", LabelListContent { labels }).await
}

pub async fn create_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<FormContent<NameForm>>> {
    let content = FormContent {
        action: "/labels/create/".to_string(),
        form: NameForm::default(),
    };

    Page::render(&state.db, &caller, "Create label", content).await
}

pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<NameForm>,
) -> ApiResult<Flash> {
    let name = form.clean()?;

    let label = Label::create(&state.db, &name)
        .await
        .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?;

    tracing::info!(label_id = label.id, name = %label.name, "Label created");

    Ok(Flash::success("/labels/", "Label successfully created"))
}

pub async fn update_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<FormContent<NameForm>>> {
    let label = find_label(&state, id).await?;

    let content = FormContent {
        action: format!("/labels/{}/update/", id),
        form: NameForm { name: label.name },
    };

    Page::render(&state.db, &caller, "Change of label", content).await
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<NameForm>,
) -> ApiResult<Flash> {
    find_label(&state, id).await?;
    let name = form.clean()?;

    let label = Label::update(&state.db, id, &name)
        .await
        .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?
        .ok_or_else(|| ApiError::not_found("Label", id))?;

    tracing::info!(label_id = label.id, name = %label.name, "Label changed");

    Ok(Flash::success("/labels/", "Label successfully changed"))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<DeleteContent<Label>>> {
    let label = find_label(&state, id).await?;

    let content = DeleteContent {
        action: format!("/labels/{}/delete/", id),
        object: label,
    };

    Page::render(&state.db, &caller, "Label deletion", content).await
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Flash> {
    let outcome = DELETE_GUARD
        .run(|| Label::delete(&state.db, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Label", id))?;

    tracing::info!(label_id = id, location = %outcome.location, "Label delete handled");

    Ok(Flash::from(outcome))
}
