use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use async_graphql::ErrorExtensions;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Scheduling violation: {message}")]
    SchedulingViolation {
        message: String,
        subject_id: Option<String>,
        earliest_start: Option<DateTime<Utc>>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Window violation: {reason} (boundary: {boundary})")]
    WindowViolation {
        reason: String,
        boundary: DateTime<Utc>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::SchedulingViolation { .. } => "SCHEDULING_VIOLATION",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::WindowViolation { .. } => "WINDOW_VIOLATION",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn too_early(reason: impl Into<String>, boundary: DateTime<Utc>) -> Self {
        AppError::WindowViolation {
            reason: reason.into(),
            boundary,
        }
    }

    pub fn too_late(reason: impl Into<String>, boundary: DateTime<Utc>) -> Self {
        AppError::WindowViolation {
            reason: reason.into(),
            boundary,
        }
    }

    /// Storage and internal failures are reported without their details.
    pub fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        }
    }

    /// The boundary a time-aware caller needs for a retry, if any.
    pub fn boundary(&self) -> Option<DateTime<Utc>> {
        match self {
            AppError::WindowViolation { boundary, .. } => Some(*boundary),
            AppError::SchedulingViolation { earliest_start, .. } => *earliest_start,
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let subject_id = match err {
            AppError::SchedulingViolation { subject_id, .. } => subject_id.clone(),
            _ => None,
        };
        ErrorResponse {
            error: err.public_message(),
            code: err.status_code().as_u16(),
            kind: err.error_code(),
            boundary: err.boundary(),
            subject_id,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::SchedulingViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::WindowViolation { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, AppError::DatabaseError(_) | AppError::InternalError(_)) {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse::from(self))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::InternalError(format!("BSON serialization error: {}", err))
    }
}

impl From<mongodb::bson::de::Error> for AppError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        AppError::InternalError(format!("BSON deserialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<async_graphql::Error> for AppError {
    fn from(err: async_graphql::Error) -> Self {
        AppError::InternalError(err.message)
    }
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        let boundary = self.boundary();
        async_graphql::Error::new(self.public_message()).extend_with(|_err, e| {
            e.set("code", self.error_code());
            if let Some(boundary) = boundary {
                e.set("boundary", boundary.to_rfc3339());
            }
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;
