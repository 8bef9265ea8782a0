//! API 错误到 HTTP 响应的映射；响应体只给简短文本，细节进日志
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("script not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthorized(AuthError::Missing) => "Unauthorized",
            Self::Unauthorized(_) => "Invalid token",
            Self::BadRequest(msg) => msg,
            Self::NotFound(_) => "Script not found",
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => error!(detail = %detail, "request failed"),
            Self::Unauthorized(reason) => warn!(reason = %reason, "rejected token"),
            _ => {}
        }
        (self.status(), self.public_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_and_bodies() {
        let cases = [
            (ApiError::Unauthorized(AuthError::Missing), 401, "Unauthorized"),
            (ApiError::Unauthorized(AuthError::Expired), 401, "Invalid token"),
            (ApiError::BadRequest("missing script parameter"), 400, "missing script parameter"),
            (ApiError::NotFound("x.sh".into()), 404, "Script not found"),
            (ApiError::Internal("disk gone".into()), 500, "Internal server error"),
        ];
        for (err, status, body) in cases {
            assert_eq!(err.status().as_u16(), status);
            assert_eq!(err.public_message(), body);
        }
    }
}
