use axum::{
    extract::{FromRef, Query, State},
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginForm, LoginView, NextQuery},
        extractors::MaybeUser,
        services::authenticate,
        session::{safe_next, SessionKeys},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

#[instrument(skip_all)]
pub async fn login_page(MaybeUser(current): MaybeUser, Query(q): Query<NextQuery>) -> Response {
    if current.is_some() {
        return Redirect::to("/").into_response();
    }
    Json(LoginView { next: q.next }).into_response()
}

#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Query(q): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let user = authenticate(state.repo.as_ref(), &form.username, &form.password).await?;

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok((
        [(SET_COOKIE, keys.session_cookie(&token))],
        Redirect::to(safe_next(q.next.as_deref())),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, MaybeUser(current): MaybeUser) -> Response {
    if let Some(user_id) = current {
        info!(user_id, "user logged out");
    }
    let keys = SessionKeys::from_ref(&state);
    ([(SET_COOKIE, keys.clear_cookie())], Redirect::to("/")).into_response()
}
