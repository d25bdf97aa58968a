use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

use super::session::{encode_next, read_cookie, SessionKeys, SESSION_COOKIE};
use crate::{db::User, error::AppError, state::AppState};

/// Session identity if a valid session cookie is present.
pub struct MaybeUser(pub Option<i64>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = read_cookie(&parts.headers, SESSION_COOKIE) else {
            return Ok(MaybeUser(None));
        };
        let keys = SessionKeys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(MaybeUser(Some(claims.sub))),
            Err(e) => {
                warn!(error = %e, "invalid or expired session");
                Ok(MaybeUser(None))
            }
        }
    }
}

/// Protected routes. Without a session, redirects to `/login?next=<target>`.
pub struct RequireUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = match MaybeUser::from_request_parts(parts, state).await {
            Ok(u) => u,
            Err(never) => match never {},
        };
        match user {
            Some(user_id) => Ok(RequireUser(user_id)),
            None => Err(login_redirect(parts)),
        }
    }
}

fn login_redirect(parts: &Parts) -> Redirect {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&format!("/login?next={}", encode_next(target)))
}

/// Session user holding the admin capability.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user_id) = RequireUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let found = state
            .repo
            .find_user(user_id)
            .await
            .map_err(|e| AppError::from(e).into_response())?;
        let Some(user) = found else {
            warn!(user_id, "session user no longer exists");
            return Err(login_redirect(parts).into_response());
        };

        if !state.config.admin.is_admin(&user.username) {
            warn!(user_id, username = %user.username, "admin access denied");
            return Err(AppError::Forbidden.into_response());
        }
        Ok(AdminUser(user))
    }
}
