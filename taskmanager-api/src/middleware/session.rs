//! Session layer
//!
//! Wraps every route. On the way in it resolves the `sessionid` cookie into
//! a [`Caller`] request extension. On the way out it applies what the
//! handler left in the response extensions:
//!
//! 1. a [`SessionChange`]: login rotates the session token, logout deletes
//!    the session;
//! 2. a [`Notice`]: queued on the caller's session, which is created on the
//!    spot for callers that don't have one yet.
//!
//! Whenever a new token was issued the response gets a `Set-Cookie` header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use taskmanager_shared::{
    auth::{
        caller::{Caller, CurrentUser},
        session_token::{expired_session_cookie, session_cookie, token_from_cookie_header},
    },
    models::{
        message::{Message, Notice},
        session::Session,
        user::User,
    },
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiError, response::SessionChange};

/// Resolves the caller and persists session side effects of the handler
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(&req);
    let caller = resolve_caller(&state, token).await?;
    req.extensions_mut().insert(caller.clone());

    let mut response = next.run(req).await;

    let change = response.extensions_mut().remove::<SessionChange>();
    let notice = response.extensions_mut().remove::<Notice>();

    let mut session_id = caller.session_id;
    let mut cookie = None;

    match change {
        Some(SessionChange::Login(user_id)) => {
            let (session, token) = login(&state, session_id, user_id).await?;
            tracing::info!(user_id, session_id = %session.id, "Session bound to user");
            session_id = Some(session.id);
            cookie = Some(issue_cookie(&state, &token));
        }
        Some(SessionChange::Logout) => {
            if let Some(id) = session_id.take() {
                Session::delete(&state.db, id).await?;
                tracing::info!(session_id = %id, "Session ended");
            }
            cookie = Some(expired_session_cookie());
        }
        None => {}
    }

    if let Some(notice) = notice {
        let id = match session_id {
            Some(id) => id,
            None => {
                let (session, token) =
                    Session::create(&state.db, None, state.config.session.ttl()).await?;
                cookie = Some(issue_cookie(&state, &token));
                session.id
            }
        };

        Message::push(&state.db, id, &notice).await?;
    }

    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::InternalError(format!("Invalid session cookie: {}", e)))?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// The `sessionid` value of the request, owned so no borrow of the request
/// outlives it
fn session_token(req: &Request) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_string)
}

async fn resolve_caller(state: &AppState, token: Option<String>) -> Result<Caller, ApiError> {
    let Some(token) = token else {
        return Ok(Caller::anonymous());
    };

    let Some(session) = Session::find_by_token(&state.db, &token).await? else {
        tracing::debug!("Unknown or expired session cookie");
        return Ok(Caller::anonymous());
    };

    let user = match session.user_id {
        Some(user_id) => User::find_by_id(&state.db, user_id)
            .await?
            .map(|user| CurrentUser::from(&user)),
        None => None,
    };

    Ok(Caller {
        session_id: Some(session.id),
        user,
    })
}

/// Rotates the current session to `user_id`, or starts one
async fn login(
    state: &AppState,
    session_id: Option<Uuid>,
    user_id: i64,
) -> Result<(Session, String), ApiError> {
    let ttl = state.config.session.ttl();

    if let Some(id) = session_id {
        if let Some(rotated) = Session::rotate(&state.db, id, Some(user_id), ttl).await? {
            return Ok(rotated);
        }
    }

    Ok(Session::create(&state.db, Some(user_id), ttl).await?)
}

fn issue_cookie(state: &AppState, token: &str) -> String {
    let session = &state.config.session;
    session_cookie(token, session.max_age_seconds(), session.cookie_secure)
}
