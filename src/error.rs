use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the llm-enhance library.
///
/// Variants fall in two classes: fatal errors that abort the run, and
/// per-file errors that are recorded in the results file before the run
/// moves on. See [`Error::is_fatal`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration is malformed or incomplete.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Input directory cannot be traversed.
    #[error("Cannot discover files in '{path}': {message}")]
    Discovery {
        /// Directory that was requested
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// API credentials are missing or invalid.
    #[error("Cannot load API key from '{path}': {message}")]
    Credential {
        /// Credential file path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Local model is not installed and could not be pulled.
    #[error("Model '{model}' is unavailable: {message}")]
    ModelUnavailable {
        /// Model name
        model: String,
        /// Diagnostic from the local runtime
        message: String,
    },

    /// A single request failed at the backend.
    #[error("Dispatch failed: {message}")]
    Dispatch {
        /// Error message
        message: String,
    },

    /// System clipboard cannot be opened.
    #[error("Clipboard error: {message}")]
    Clipboard {
        /// Error message
        message: String,
    },

    /// Results could not be written.
    #[error("Failed to persist results to '{path}': {message}")]
    Persistence {
        /// Path that could not be written
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// JSON or YAML serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[must_use]
    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a credential error.
    #[must_use]
    pub fn credential(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Credential {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a model unavailable error.
    #[must_use]
    pub fn model_unavailable(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Creates a per-file dispatch error.
    #[must_use]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// Creates a clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard {
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Per-file failures (dispatch errors and unreadable source files) are
    /// recorded and processing continues with the next file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Dispatch { .. } | Self::Io { .. } | Self::InvalidUtf8 { .. }
        )
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is a credential error.
    #[must_use]
    pub const fn is_credential(&self) -> bool {
        matches!(self, Self::Credential { .. })
    }

    /// Returns true if this is a model unavailable error.
    #[must_use]
    pub const fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }

    /// Returns true if this is a discovery error.
    #[must_use]
    pub const fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
