//! Error taxonomy for recording, playback and anchor matching.

use thiserror::Error;

/// Errors that can occur while loading, recording or replaying a macro.
///
/// Only `MalformedEvent` is ever fatal to an operation (loading a macro
/// file). Capture and dispatch failures are reported and skipped so an
/// unattended playback run keeps going.
#[derive(Error, Debug)]
pub enum MacroError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("capture failed: {0}")]
    CaptureFailure(String),

    #[error("event dispatch failed: {0}")]
    DispatchFailure(String),

    #[error("wait-for-image timed out after {0}s")]
    Timeout(f64),

    #[error("a recording or playback run is already active")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for macro operations
pub type MacroResult<T> = Result<T, MacroError>;
