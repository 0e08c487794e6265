//! Error types shared by the print pipeline

use thiserror::Error;

/// Failures a print can end with.
///
/// Only [`PrintError::TaintedCanvas`] is meant to reach the user as a
/// blocking message; every other degradation (missing legend image, failed
/// coordinate transform, ambiguous probe) is handled locally and never
/// becomes a `PrintError`.
#[derive(Error, Debug)]
pub enum PrintError {
    #[error("Map image cannot be exported: layer '{layer}' was loaded from another origin without CORS headers")]
    TaintedCanvas { layer: String },

    #[error("Print was cancelled")]
    Aborted,

    #[error("Invalid print request: {message}")]
    InvalidRequest { message: String },

    #[error("Rendering error: {message}")]
    Rendering { message: String },

    #[error("PDF error: {message}")]
    Pdf { message: String },
}

impl PrintError {
    pub fn tainted<S: Into<String>>(layer: S) -> Self {
        Self::TaintedCanvas { layer: layer.into() }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    pub fn rendering<S: Into<String>>(message: S) -> Self {
        Self::Rendering { message: message.into() }
    }

    pub fn pdf<S: Into<String>>(message: S) -> Self {
        Self::Pdf { message: message.into() }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Coordinate reference system failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrsError {
    #[error("Unrecognized CRS identifier: {0}")]
    Unparseable(String),

    #[error("CRS {0} is not registered")]
    Unsupported(String),

    #[error("Coordinate ({x}, {y}) cannot be transformed from {from} to {to}")]
    OutOfDomain { x: f64, y: f64, from: String, to: String },
}

/// Result type for print operations
pub type PrintResult<T> = Result<T, PrintError>;
