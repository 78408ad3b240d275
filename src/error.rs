use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    auth::AuthError,
    model::{TaskId, UserId},
    normalize::{InvalidListName, ListName},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("task list {0} not found")]
    ListNotFound(ListName),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("user {0} is already registered")]
    AlreadyExists(UserId),

    #[error("user {user} kept changing underneath us; gave up after {attempts} attempts")]
    Conflict { user: UserId, attempts: u32 },

    #[error("task list store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("stored task lists could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::ListNotFound(_) | Self::TaskNotFound(_)
        )
    }
}

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidListName),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label, message) = match &self {
            AppError::Store(err) if err.is_not_found() => {
                (StatusCode::NOT_FOUND, "fail", self.to_string())
            }
            AppError::Store(StoreError::AlreadyExists(_)) => {
                (StatusCode::CONFLICT, "fail", self.to_string())
            }
            AppError::Store(StoreError::Conflict { .. }) => {
                tracing::warn!(error = %self, "giving up on contended write");
                (StatusCode::CONFLICT, "error", self.to_string())
            }
            AppError::Store(_) => {
                tracing::error!(error = %self, "task list store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    "Something bad happened while accessing the task lists".to_owned(),
                )
            }
            AppError::Auth(err) => (err.status_code(), "fail", self.to_string()),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "fail", self.to_string()),
        };

        let error_response = json!({
            "status": label,
            "message": message,
        });
        (status, Json(error_response)).into_response()
    }
}
