use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{AdminIndex, ListQuery, ResourceSummary},
    resource::{AdminResource, Categories, Comments, Posts, Users},
};
use crate::{
    auth::extractors::AdminUser,
    db::{ListParams, Page, Repository},
    error::{AppError, FieldErrors},
    state::AppState,
};

/// list/create on `/admin/<name>`, show/update/delete on `/admin/<name>/:id`.
pub fn resource_routes<R: AdminResource>() -> Router<AppState> {
    Router::new()
        .route(&format!("/admin/{}", R::NAME), get(list::<R>).post(create::<R>))
        .route(
            &format!("/admin/{}/:id", R::NAME),
            get(show::<R>).put(update::<R>).delete(destroy::<R>),
        )
}

/// Ids that do not parse can never name a row.
fn row_id<R: AdminResource>(id: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    id.map(|Path(id)| id).map_err(|_| AppError::NotFound(R::NAME))
}

/// Malformed or incomplete bodies surface as field errors like any other validation failure.
fn body<T>(input: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    input.map(|Json(v)| v).map_err(|rejection| {
        let text = rejection.body_text();
        let mut errors = FieldErrors::new();
        match missing_field(&text) {
            Some(field) => errors.insert(field.to_string(), format!("{field} is required")),
            None => errors.insert("body".into(), text),
        };
        AppError::Validation(errors)
    })
}

fn missing_field(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once("missing field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

async fn count<R: AdminResource>(repo: &dyn Repository) -> Result<ResourceSummary, AppError> {
    let single = ListParams {
        q: None,
        limit: 1,
        offset: 0,
    };
    Ok(ResourceSummary {
        name: R::NAME,
        count: R::list(repo, &single).await?.total,
    })
}

#[instrument(skip_all, fields(admin = %admin.username))]
pub async fn index(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<AdminIndex>, AppError> {
    let repo = state.repo.as_ref();
    Ok(Json(AdminIndex {
        resources: vec![
            count::<Users>(repo).await?,
            count::<Categories>(repo).await?,
            count::<Posts>(repo).await?,
            count::<Comments>(repo).await?,
        ],
    }))
}

#[instrument(skip(state, admin), fields(resource = R::NAME, admin = %admin.username))]
async fn list<R: AdminResource>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Page<R::Row>>, AppError> {
    let params = ListParams::from(q);
    Ok(Json(R::list(state.repo.as_ref(), &params).await?))
}

#[instrument(skip(state, admin), fields(resource = R::NAME, admin = %admin.username))]
async fn show<R: AdminResource>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<R::Row>, AppError> {
    let id = row_id::<R>(id)?;
    R::get(state.repo.as_ref(), id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(R::NAME))
}

#[instrument(skip(state, admin, input), fields(resource = R::NAME, admin = %admin.username))]
async fn create<R: AdminResource>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    input: Result<Json<R::Input>, JsonRejection>,
) -> Result<(StatusCode, Json<R::Row>), AppError> {
    let row = R::create(state.repo.as_ref(), body(input)?).await?;
    info!(resource = R::NAME, "admin created row");
    Ok((StatusCode::CREATED, Json(row)))
}

#[instrument(skip(state, admin, input), fields(resource = R::NAME, admin = %admin.username))]
async fn update<R: AdminResource>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
    input: Result<Json<R::Input>, JsonRejection>,
) -> Result<Json<R::Row>, AppError> {
    let id = row_id::<R>(id)?;
    let row = R::update(state.repo.as_ref(), id, body(input)?)
        .await?
        .ok_or(AppError::NotFound(R::NAME))?;
    info!(resource = R::NAME, id, "admin updated row");
    Ok(Json(row))
}

#[instrument(skip(state, admin), fields(resource = R::NAME, admin = %admin.username))]
async fn destroy<R: AdminResource>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = row_id::<R>(id)?;
    if !R::delete(state.repo.as_ref(), id).await? {
        return Err(AppError::NotFound(R::NAME));
    }
    info!(resource = R::NAME, id, "admin deleted row");
    Ok(StatusCode::NO_CONTENT)
}
