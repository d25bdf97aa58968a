use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use tracing::instrument;

use super::{
    dto::{AboutView, CategoryPostsView, CommentForm, HomeQuery, HomeView, Notice},
    services::{
        category_listing, home_listing, parse_post_id, post_detail, submit_comment,
        CommentOutcome,
    },
};
use crate::{
    auth::{
        extractors::{MaybeUser, RequireUser},
        session::{clear_flash_cookie, flash_cookie, read_cookie, FLASH_COOKIE},
    },
    error::AppError,
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/about/", get(about))
        .route("/posts/:category_name", get(posts_by_category))
        .route("/post/:post_id", get(show_post).post(add_comment))
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Query(q): Query<HomeQuery>,
) -> Result<Json<HomeView>, AppError> {
    let mut view = home_listing(state.repo.as_ref(), q.category_id.as_deref()).await?;
    view.current_user_id = current;
    Ok(Json(view))
}

pub async fn about() -> Json<AboutView> {
    Json(AboutView {
        title: "About",
        body: "A small news portal: read posts by category and join the discussion.",
    })
}

#[instrument(skip(state))]
pub async fn posts_by_category(
    State(state): State<AppState>,
    Path(category_name): Path<String>,
) -> Result<Json<CategoryPostsView>, AppError> {
    Ok(Json(category_listing(state.repo.as_ref(), &category_name).await?))
}

#[instrument(skip(state, headers))]
pub async fn show_post(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let mut view = post_detail(state.repo.as_ref(), post_id).await?;

    let notice = read_cookie(&headers, FLASH_COOKIE).and_then(Notice::from_code);
    view.notice = notice.map(Notice::message);
    if notice.is_some() {
        let clear = clear_flash_cookie(state.config.session.cookie_secure);
        return Ok(([(SET_COOKIE, clear)], Json(view)).into_response());
    }
    Ok(Json(view).into_response())
}

#[instrument(skip(state, form))]
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let secure = state.config.session.cookie_secure;
    match submit_comment(state.repo.as_ref(), post_id, user_id, form.body.as_deref()).await? {
        CommentOutcome::Created(comment) => Ok((
            [(SET_COOKIE, flash_cookie(Notice::CommentAdded.code(), secure))],
            Redirect::to(&format!("/post/{}", comment.post_id)),
        )
            .into_response()),
        CommentOutcome::Rejected(view) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(view)).into_response())
        }
    }
}
