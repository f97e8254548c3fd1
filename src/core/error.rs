use std::path::PathBuf;

/// Result type alias for vignette-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vignette-runner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Test runner errors (spawning or waiting on the host tool).
    #[error("Runner error: {0}")]
    Runner(String),

    /// Image or text comparison setup errors.
    #[error("Comparison error: {0}")]
    Comparison(String),

    /// Timing log aggregation errors.
    #[error("Timing error: {0}")]
    Timing(String),

    /// Chart rendering errors.
    #[error("Chart error: {0}")]
    Chart(String),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Missing required configuration field.
    #[error("Missing required configuration field: {0}")]
    MissingConfig(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidConfig { field: String, value: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a runner error.
    pub fn runner(msg: impl Into<String>) -> Self {
        Error::Runner(msg.into())
    }

    /// Create a comparison error.
    pub fn comparison(msg: impl Into<String>) -> Self {
        Error::Comparison(msg.into())
    }

    /// Create a timing aggregation error.
    pub fn timing(msg: impl Into<String>) -> Self {
        Error::Timing(msg.into())
    }

    /// Create a chart rendering error.
    pub fn chart(msg: impl Into<String>) -> Self {
        Error::Chart(msg.into())
    }

    /// Whether this error should abort the whole suite.
    ///
    /// Data errors (bad timing files, malformed per-test JSON, a test
    /// directory without its script or baseline) are recoverable per test;
    /// configuration errors are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::MissingConfig(_)
                | Error::InvalidConfig { .. }
                | Error::TomlDe(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        assert_eq!(
            Error::config("bad value").to_string(),
            "Configuration error: bad value"
        );
        assert_eq!(
            Error::runner("not found").to_string(),
            "Runner error: not found"
        );
        assert_eq!(
            Error::comparison("bad pattern").to_string(),
            "Comparison error: bad pattern"
        );
        assert_eq!(
            Error::timing("no files").to_string(),
            "Timing error: no files"
        );
        assert_eq!(
            Error::chart("empty series").to_string(),
            "Chart error: empty series"
        );
    }

    #[test]
    fn test_error_file_not_found() {
        let err = Error::FileNotFound(PathBuf::from("/missing/file.py"));
        assert_eq!(err.to_string(), "File not found: /missing/file.py");
    }

    #[test]
    fn test_error_invalid_config() {
        let err = Error::InvalidConfig {
            field: "runner.tool".to_string(),
            value: "blender".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for runner.tool: blender"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("x").is_fatal());
        assert!(Error::MissingConfig("test_type".into()).is_fatal());
        assert!(!Error::timing("x").is_fatal());
        // a test without its script is skipped, the suite goes on
        assert!(!Error::FileNotFound(PathBuf::from("ex00/*.py")).is_fatal());
        assert!(!Error::comparison("bad pattern").is_fatal());
    }
}
