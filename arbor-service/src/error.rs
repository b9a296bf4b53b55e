use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ErrorEnvelope,
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorEnvelope::new(
                "unauthorized",
                "Missing or invalid auth credential",
                "Pass ?auth={token} on every request",
            ),
        }
    }

    pub fn bad_request(msg: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorEnvelope::new(
                "bad_request",
                msg.to_string(),
                "Check the location path and request body",
            ),
        }
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorEnvelope::new(
                "internal_error",
                msg.to_string(),
                "Check service logs for details",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self.body)).into_response()
    }
}

impl From<arbor_core::ArborError> for AppError {
    fn from(err: arbor_core::ArborError) -> Self {
        match &err {
            arbor_core::ArborError::PathResolution { .. } => AppError::bad_request(err),
            _ => AppError::internal(err),
        }
    }
}
