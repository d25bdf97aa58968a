use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::RepoError;

/// Field name -> message, rendered next to the offending form input.
pub type FieldErrors = BTreeMap<String, String>;

/// Errors surfaced by request handlers. Each variant is scoped to one request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden")]
    Forbidden,

    #[error("integrity violation on {field}: {message}")]
    Integrity { field: String, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Integrity { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::NotFound(what) => (status, format!("{what} not found")).into_response(),
            AppError::InvalidCredentials => (status, "Invalid credentials").into_response(),
            AppError::Forbidden => (status, "Forbidden").into_response(),
            AppError::Validation(errors) => (status, Json(json!({ "errors": errors }))).into_response(),
            AppError::Integrity { field, message } => {
                (status, Json(json!({ "errors": { field: message } }))).into_response()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                (status, "Internal server error").into_response()
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Unique { field } => AppError::Integrity {
                message: format!("{field} is already taken"),
                field,
            },
            RepoError::ForeignKey { field } => AppError::Integrity {
                message: format!("{field} does not reference an existing row"),
                field,
            },
            RepoError::InUse(entity) => AppError::Integrity {
                field: "id".into(),
                message: format!("{entity} is still referenced and cannot be deleted"),
            },
            RepoError::Database(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}
