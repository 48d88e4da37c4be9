use std::convert::Infallible;

use bytes::Bytes;
use court_rotation_config::ConfigError;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use tracing::error;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] http::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("poison error: the application state lock was poisoned")]
    Poison,
    #[error("invalid command: {0}")]
    InvalidCommand(serde_json::Error),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("request body is larger than {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl From<Infallible> for AppError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCommand(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::File(_)
            | Self::Json(_)
            | Self::Http(_)
            | Self::Config(_)
            | Self::Join(_)
            | Self::Poison => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as `{"error": "..."}` with the matching status.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}
