use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while starting or stopping the encoder
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Select or upload a video first.")]
    MissingSource,

    #[error("Enter the YouTube stream key.")]
    MissingStreamKey,

    #[error("ffmpeg is already running (pid {0}). Stop it before starting a new stream.")]
    AlreadyRunning(u32),

    #[error("Failed to start ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to stop ffmpeg: {0}")]
    Stop(#[source] std::io::Error),
}

impl StreamError {
    /// Convert error to the HTTP status reported by the control page
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::MissingSource | StreamError::MissingStreamKey => StatusCode::BAD_REQUEST,
            StreamError::AlreadyRunning(_) => StatusCode::CONFLICT,
            StreamError::Spawn(_) | StreamError::Stop(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
