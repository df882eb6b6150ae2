//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use taskmanager_api::{app::AppState, config::Config};
//! use sqlx::PgPool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = PgPool::connect(&config.database.url).await?;
//! let state = AppState::new(pool, config);
//! let app = taskmanager_api::app::build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    middleware::{login_required::login_required, security::SecurityHeadersLayer, session::session_layer},
    routes,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// GET       /                      home                 public
/// GET       /health                health check         public
/// GET|POST  /login/                login                public
/// POST      /logout/               logout               public
/// GET       /users/                user list            public
/// GET|POST  /users/create/         registration         public
/// GET|POST  /users/:id/update/     edit user            gate + self only
/// GET|POST  /users/:id/delete/     delete user          gate + self only + protected
/// GET       /statuses/             status list          gate
/// GET|POST  /statuses/create/      create status        gate
/// GET|POST  /statuses/:id/update/  edit status          gate
/// GET|POST  /statuses/:id/delete/  delete status        gate + protected
/// GET       /labels/ ...           same as statuses     gate (+ protected on delete)
/// GET       /tasks/                filtered task list   gate
/// GET|POST  /tasks/create/         create task          gate
/// GET       /tasks/:id/            task detail          gate
/// GET|POST  /tasks/:id/update/     edit task            gate
/// GET|POST  /tasks/:id/delete/     delete task          gate + author only
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. Logging (tower-http TraceLayer)
/// 3. Session layer (caller resolution, notices, login/logout)
/// 4. Authentication gate (`route_layer`, protected routes only)
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(routes::home::index))
        .route("/health", get(routes::health::health_check))
        .route("/login/", get(routes::auth::login_page).post(routes::auth::login))
        .route("/logout/", axum::routing::post(routes::auth::logout))
        .route("/users/", get(routes::users::list))
        .route(
            "/users/create/",
            get(routes::users::create_page).post(routes::users::create),
        );

    let protected_routes = Router::new()
        .route(
            "/users/:id/update/",
            get(routes::users::update_page).post(routes::users::update),
        )
        .route(
            "/users/:id/delete/",
            get(routes::users::delete_page).post(routes::users::delete),
        )
        .route("/statuses/", get(routes::statuses::list))
        .route(
            "/statuses/create/",
            get(routes::statuses::create_page).post(routes::statuses::create),
        )
        .route(
            "/statuses/:id/update/",
            get(routes::statuses::update_page).post(routes::statuses::update),
        )
        .route(
            "/statuses/:id/delete/",
            get(routes::statuses::delete_page).post(routes::statuses::delete),
        )
        .route("/labels/", get(routes::labels::list))
        .route(
            "/labels/create/",
            get(routes::labels::create_page).post(routes::labels::create),
        )
        .route(
            "/labels/:id/update/",
            get(routes::labels::update_page).post(routes::labels::update),
        )
        .route(
            "/labels/:id/delete/",
            get(routes::labels::delete_page).post(routes::labels::delete),
        )
        .route("/tasks/", get(routes::tasks::list))
        .route(
            "/tasks/create/",
            get(routes::tasks::create_page).post(routes::tasks::create),
        )
        .route("/tasks/:id/", get(routes::tasks::detail))
        .route(
            "/tasks/:id/update/",
            get(routes::tasks::update_page).post(routes::tasks::update),
        )
        .route(
            "/tasks/:id/delete/",
            get(routes::tasks::delete_page).post(routes::tasks::delete),
        )
        .route_layer(from_fn(login_required));

    let production = state.config.api.production;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(state.clone(), session_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, DatabaseConfig, SessionConfig};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// A router whose pool never connects unless a handler needs it
    fn app() -> Router {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/unused".to_string(),
                max_connections: 1,
            },
            session: SessionConfig {
                ttl_hours: 1,
                cookie_secure: false,
            },
        };
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();

        build_router(AppState::new(db, config))
    }

    #[tokio::test]
    async fn test_home_page_through_the_full_stack() {
        for cookie in [None, Some("sessionid=malformed")] {
            let mut request = Request::builder().uri("/");
            if let Some(cookie) = cookie {
                request = request.header(header::COOKIE, cookie);
            }

            let response = app()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            assert_eq!(response.headers()["x-frame-options"], "DENY");
        }
    }
}
