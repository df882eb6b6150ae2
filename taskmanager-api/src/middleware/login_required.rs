//! Authentication gate
//!
//! Installed with `route_layer` on every route that needs a logged-in user.
//! Anonymous callers are sent to `/login/?next=<requested path>` with an
//! error notice; the handler behind the gate never runs for them.

use axum::{
    extract::{OriginalUri, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use taskmanager_shared::auth::{
    authorization::{Access, AccessCheck, Authenticated},
    caller::Caller,
};

use crate::response::Flash;

pub async fn login_required(req: Request, next: Next) -> Response {
    let caller = req.extensions().get::<Caller>().cloned().unwrap_or_default();

    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let requested = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    match Authenticated.check(&caller, requested) {
        Access::Allow => next.run(req).await,
        Access::Deny(outcome) => {
            tracing::info!(path = %uri.path(), "Anonymous request redirected to login");
            Flash::from(outcome).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        routing::get,
        Extension, Router,
    };
    use taskmanager_shared::{
        auth::{authorization::NOT_AUTHENTICATED_MESSAGE, caller::CurrentUser},
        models::message::Notice,
    };
    use tower::ServiceExt;

    fn app(caller: Caller) -> Router {
        Router::new()
            .route("/statuses/", get(|| async { "statuses" }))
            .route_layer(axum::middleware::from_fn(login_required))
            .layer(Extension(caller))
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_redirected() {
        let response = app(Caller::anonymous())
            .oneshot(
                Request::builder()
                    .uri("/statuses/?page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login/?next=/statuses/%3Fpage%3D2"
        );
        assert_eq!(
            response.extensions().get::<Notice>(),
            Some(&Notice::error(NOT_AUTHENTICATED_MESSAGE))
        );
    }

    #[tokio::test]
    async fn test_logged_in_caller_passes() {
        let caller = Caller::authenticated(
            None,
            CurrentUser {
                id: 1,
                username: "alice".to_string(),
                full_name: "Alice Liddell".to_string(),
            },
        );

        let response = app(caller)
            .oneshot(Request::builder().uri("/statuses/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_route_is_not_gated() {
        let response = app(Caller::anonymous())
            .oneshot(Request::builder().uri("/nowhere/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
