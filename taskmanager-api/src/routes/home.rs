//! Landing page

use axum::{extract::State, Extension};
use serde::Serialize;
use taskmanager_shared::auth::caller::Caller;

use crate::{app::AppState, error::ApiResult, response::Page};

#[derive(Debug, Serialize)]
pub struct HomeContent {
    pub greeting: &'static str,
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<HomeContent>> {
    Page::render(
        &state.db,
        &caller,
        "Task manager",
        HomeContent {
            greeting: "Hello from Hexlet!",
        },
    )
    .await
}
