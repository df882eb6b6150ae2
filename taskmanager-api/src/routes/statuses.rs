//! Status endpoints
//!
//! All of them sit behind the authentication gate. A status carried by a
//! task cannot be deleted.

use axum::{
    extract::{Path, State},
    Extension, Form,
};
use serde::Serialize;
use taskmanager_shared::{
    auth::caller::Caller,
    db::deletion::ProtectedDelete,
    models::status::Status,
};

use crate::{
    app::AppState,
    error::{unique_as_field, ApiError, ApiResult},
    response::{Flash, Page},
    routes::forms::{DeleteContent, FormContent, NameForm},
};

pub const NAME_TAKEN_MESSAGE: &str = "Status with this Name already exists.";

const DELETE_GUARD: ProtectedDelete = ProtectedDelete {
    success_url: "/statuses/",
    success_message: "Status is successfully deleted",
    denied_url: "/statuses/",
    denied_message: "Cannot delete status because it is in use",
};

#[derive(Debug, Serialize)]
pub struct StatusListContent {
    pub statuses: Vec<Status>,
}

async fn find_status(state: &AppState, id: i64) -> ApiResult<Status> {
    Status::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Status", id))
}

/// `GET /statuses/`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<StatusListContent>> {
    let statuses = Status::list(&state.db).await?;
    Page::render(&state.db, &caller, "Statuses", StatusListContent { statuses }).await
}

/// `GET /statuses/create/`
pub async fn create_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<FormContent<NameForm>>> {
    let content = FormContent {
        action: "/statuses/create/".to_string(),
        form: NameForm::default(),
    };

    Page::render(&state.db, &caller, "Create status", content).await
}

/// `POST /statuses/create/`
pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<NameForm>,
) -> ApiResult<Flash> {
    let name = form.clean()?;

    let status = Status::create(&state.db, &name)
        .await
        .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?;

    tracing::info!(status_id = status.id, name = %status.name, "Status created");

    Ok(Flash::success("/statuses/", "Status successfully created"))
}

/// `GET /statuses/:id/update/`
pub async fn update_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<FormContent<NameForm>>> {
    let status = find_status(&state, id).await?;

    let content = FormContent {
        action: format!("/statuses/{}/update/", id),
        form: NameForm { name: status.name },
    };

    Page::render(&state.db, &caller, "Change of status", content).await
}

/// `POST /statuses/:id/update/`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<NameForm>,
) -> ApiResult<Flash> {
    find_status(&state, id).await?;
    let name = form.clean()?;

    let status = Status::update(&state.db, id, &name)
        .await
        .map_err(unique_as_field("name", NAME_TAKEN_MESSAGE))?
        .ok_or_else(|| ApiError::not_found("Status", id))?;

    tracing::info!(status_id = status.id, name = %status.name, "Status changed");

    Ok(Flash::success("/statuses/", "Status successfully changed"))
}

/// `GET /statuses/:id/delete/`
pub async fn delete_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Page<DeleteContent<Status>>> {
    let status = find_status(&state, id).await?;

    let content = DeleteContent {
        action: format!("/statuses/{}/delete/", id),
        object: status,
    };

    Page::render(&state.db, &caller, "Status deletion", content).await
}

/// `POST /statuses/:id/delete/`
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Flash> {
    let outcome = DELETE_GUARD
        .run(|| Status::delete(&state.db, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Status", id))?;

    tracing::info!(status_id = id, location = %outcome.location, "Status delete handled");

    Ok(Flash::from(outcome))
}
