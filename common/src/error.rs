use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::AmountError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the services. Each variant maps to one HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(anyhow::Error),
}

const DUPLICATE_RECORD: &str = "A record with the same name already exists";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            log::warn!("Unique constraint violated: {}", err);
            return ServiceError::Conflict(DUPLICATE_RECORD.to_string());
        }
        ServiceError::Internal(anyhow::Error::new(err).context("Database error"))
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        // Database helpers wrap sqlx errors in context; look through it.
        if err.downcast_ref::<sqlx::Error>().is_some_and(is_unique_violation) {
            log::warn!("Unique constraint violated: {:#}", err);
            return ServiceError::Conflict(DUPLICATE_RECORD.to_string());
        }
        ServiceError::Internal(err)
    }
}

impl From<AmountError> for ServiceError {
    fn from(err: AmountError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    message: String,
    error: &'a str,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ServiceError::Internal(err) = self {
            log::error!("Internal error: {:#}", err);
        }
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            status_code: status.as_u16(),
            message: self.to_string(),
            error: status.canonical_reason().unwrap_or("Error"),
        })
    }
}
