//! Error types for the application layer.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level error.
///
/// Graphics failures from the lower layers arrive as [`Error::Rhi`] with the
/// lower layer's message; recoverable presentation states never reach here.
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal graphics-layer errors
    #[error("Graphics error: {0}")]
    Rhi(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error in {path}: {message}")]
    Config {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

/// Result type alias using the application Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_path() {
        let err = Error::Config {
            path: PathBuf::from("vkframe.toml"),
            message: "expected `=`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("vkframe.toml"));
        assert!(text.contains("expected `=`"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
