pub mod bootstrap;
mod dto;
pub mod handlers;
pub mod resource;

use crate::state::AppState;
use axum::{routing::get, Router};

use resource::{Categories, Comments, Posts, Users};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::index))
        .route("/admin/", get(handlers::index))
        .merge(handlers::resource_routes::<Users>())
        .merge(handlers::resource_routes::<Categories>())
        .merge(handlers::resource_routes::<Posts>())
        .merge(handlers::resource_routes::<Comments>())
}
