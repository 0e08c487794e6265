//! Error handling for the GeoPrint CLI

use geoprint_core::PrintError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for GeoPrint CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid print job {file}: {message}")]
    InvalidJob { file: String, message: String },

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn invalid_job<S: Into<String>>(file: S, message: S) -> Self {
        Self::InvalidJob { file: file.into(), message: message.into() }
    }

    /// Recover the typed error behind an `anyhow` chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<CliError>() {
            Ok(cli) => cli,
            Err(err) => match err.downcast::<PrintError>() {
                Ok(print) => Self::Print(print),
                Err(err) => Self::Other(format!("{:#}", err)),
            },
        }
    }

    /// Cancelled prints exit quietly.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Print(e) if e.is_aborted())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Paths inside a print job are resolved relative to the job file",
                path.display()
            ));
        }

        CliError::InvalidJob { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • The job needs `view`, `selection` and `layerTree` entries\n\
                 • Extents are [minX, minY, maxX, maxY] in EPSG:3857\n\
                 • DPI must be one of 72, 96, 150 or 300",
            );
        }

        CliError::Print(PrintError::TaintedCanvas { layer }) => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Serve '{}' with CORS headers (Access-Control-Allow-Origin)\n\
                 • Switch to a basemap that allows cross-origin use\n\
                 • Hide the layer and print again",
                layer
            ));
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your geoprint.toml configuration file\n\
                 • Use 'geoprint config --example' to generate a sample configuration",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_tainted_canvas_suggests_cors() {
        let err = CliError::from(PrintError::tainted("osm"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("CORS"));
        assert!(formatted.contains("'osm'"));
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_print_errors() {
        let err = CliError::from_anyhow(anyhow::Error::new(PrintError::Aborted).context("printing"));
        assert!(err.is_silent());
        let other = CliError::from_anyhow(anyhow::anyhow!("boom"));
        assert!(matches!(other, CliError::Other(ref m) if m == "boom"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io { .. }));
    }
}
