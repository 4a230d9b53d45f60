use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors surfaced at the authentication boundary. Sign-in and token
/// failures stay generic; sign-up failures name the offending field.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email is invalid")]
    InvalidEmail,
    #[error("email has already been taken")]
    DuplicateEmail,
    #[error("password is too short (minimum is {min} characters)")]
    WeakPassword { min: usize },
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthenticated,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidEmail => "invalid_email",
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::WeakPassword { .. } => "weak_password",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unauthenticated => "unauthorized",
            AuthError::Internal(_) => "internal",
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            AuthError::InvalidEmail | AuthError::DuplicateEmail => Some("email"),
            AuthError::WeakPassword { .. } => Some("password"),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail | AuthError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(ErrorBody {
            error: message,
            kind: self.kind(),
            field: self.field(),
        });
        (self.status_code(), body).into_response()
    }
}
