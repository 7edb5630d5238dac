//! Errors reported to the host embedding the starfield.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StarfieldError {
    /// The drawing surface (canvas element or its 2D context) could not be obtained.
    #[error("drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("invalid starfield configuration: {0}")]
    InvalidConfig(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StarfieldError {
    fn from(err: serde_json::Error) -> Self {
        StarfieldError::InvalidConfig(err.to_string())
    }
}
