//! Error taxonomy shared by all repository backends.

use thiserror::Error;

/// Boxed cause attached to a domain error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`LibraryRepository`](super::LibraryRepository) operations.
///
/// Only absence and descriptor problems are normalised into domain kinds;
/// I/O and transport failures pass through unchanged.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("library '{name}' not found in {repository}")]
    NotFound {
        repository: String,
        name: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("library '{name}' in {repository} is malformed: {reason}")]
    Format {
        repository: String,
        name: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{repository} does not support {operation}")]
    Unsupported {
        repository: String,
        operation: &'static str,
    },

    #[error("invalid registry endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RepositoryError {
    pub fn not_found(repository: impl Into<String>, name: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            repository: repository.into(),
            name: name.into(),
            source: None,
        }
    }

    pub fn not_found_because(
        repository: impl Into<String>,
        name: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        RepositoryError::NotFound {
            repository: repository.into(),
            name: name.into(),
            source: Some(cause.into()),
        }
    }

    pub fn format(
        repository: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RepositoryError::Format {
            repository: repository.into(),
            name: name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn format_because(
        repository: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        RepositoryError::Format {
            repository: repository.into(),
            name: name.into(),
            reason: reason.into(),
            source: Some(cause.into()),
        }
    }

    /// Stable kind string callers can branch on without parsing messages
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryError::NotFound { .. } => "LibraryNotFoundError",
            RepositoryError::Format { .. } => "LibraryFormatError",
            RepositoryError::Unsupported { .. } => "UnsupportedOperation",
            RepositoryError::InvalidEndpoint { .. } => "InvalidEndpoint",
            RepositoryError::Io(_) => "IoError",
            RepositoryError::Http(_) => "HttpError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, RepositoryError::Format { .. })
    }

    /// Name of the library the error refers to, for the domain kinds
    pub fn library_name(&self) -> Option<&str> {
        match self {
            RepositoryError::NotFound { name, .. } | RepositoryError::Format { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }
}

/// Result alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;
