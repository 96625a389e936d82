use axum::{Json, http::StatusCode};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Expected, user-facing failures of the retention operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetentionError {
    #[error("no resets remaining ({remaining} left)")]
    InsufficientResets { remaining: u32 },

    #[error("relapse date {last_relapse_at} is after {now}")]
    InvalidRelapseDate {
        last_relapse_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("unknown habit '{0}'")]
    UnknownHabit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reset policy '{0}'")]
pub struct UnknownResetPolicy(pub String);

/// Failures of the persisted-profile collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read or write data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode profile data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("profile '{0}' not found")]
    NotFound(String),

    #[error("profile '{0}' already exists")]
    AlreadyExists(String),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn in_progress(user_id: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: "operation_in_progress",
            message: format!("another reset or habit switch is running for '{user_id}'"),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "persistence_failure",
            message: err.to_string(),
        }
    }
}

impl From<RetentionError> for AppError {
    fn from(err: RetentionError) -> Self {
        let (status, code) = match err {
            RetentionError::InsufficientResets { .. } => {
                (StatusCode::CONFLICT, "insufficient_resets")
            }
            RetentionError::InvalidRelapseDate { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_relapse_date")
            }
            RetentionError::UnknownHabit(_) => (StatusCode::BAD_REQUEST, "unknown_habit"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            StoreError::AlreadyExists(_) => Self {
                status: StatusCode::CONFLICT,
                code: "conflict",
                message: err.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_errors_map_to_distinct_codes() {
        let insufficient = AppError::from(RetentionError::InsufficientResets { remaining: 0 });
        assert_eq!(insufficient.status, StatusCode::CONFLICT);
        assert_eq!(insufficient.code, "insufficient_resets");

        let now = Utc::now();
        let invalid = AppError::from(RetentionError::InvalidRelapseDate {
            last_relapse_at: now,
            now,
        });
        assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.code, "invalid_relapse_date");
    }

    #[test]
    fn store_errors_map_to_status() {
        let missing = AppError::from(StoreError::NotFound("u1".into()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let io = AppError::from(StoreError::Io(std::io::Error::other("disk full")));
        assert_eq!(io.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.code, "persistence_failure");
    }
}
