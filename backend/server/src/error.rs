use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use board::BoardError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    Board(#[from] BoardError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Board(BoardError::Validation(_) | BoardError::Rejected(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Board(BoardError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Board(BoardError::Backend(e)) => {
                error!("Backend failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },
}
