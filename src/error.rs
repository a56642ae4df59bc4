use std::path::PathBuf;

use axum::extract::multipart::MultipartError;
use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Placement { from: PathBuf, to: PathBuf, source: std::io::Error },
    #[error("failed to remove page file {}: {source}", path.display())]
    Removal { path: PathBuf, source: std::io::Error },
    #[error("failed to update page index at {}: {source}", path.display())]
    IndexPersist { path: PathBuf, source: std::io::Error },
    #[error("{0}")]
    Build(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::NotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Placement { .. }
            | AppError::Removal { .. }
            | AppError::IndexPersist { .. }
            | AppError::Build(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(format!("bad multipart body: {}", err.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if let AppError::Internal(e) = &self {
            tracing::error!(error = %e, "request failed");
        }
        (self.status(), self.to_string()).into_response()
    }
}
