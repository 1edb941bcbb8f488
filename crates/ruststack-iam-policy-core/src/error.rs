//! Engine error types.
//!
//! Validation rejections are reported with
//! [`ruststack_iam_policy_model::PolicyError`]. The enums here cover
//! everything else: catalog loading at startup, the directory collaborator,
//! and failures on the authorization path that must not be mistaken for a
//! decision.

/// Failure loading a static catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Path of the catalog file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A catalog file is not valid JSON of the expected shape.
    #[error("invalid catalog {name}: {source}")]
    Parse {
        /// Catalog name.
        name: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A catalog was readable but defines nothing.
    #[error("catalog {0} is empty")]
    Empty(String),

    /// An action name does not carry the catalog's service prefix.
    #[error("action {action} does not belong to service {service}")]
    ForeignAction {
        /// Offending action name.
        action: String,
        /// Service the catalog was loaded for.
        service: String,
    },
}

/// Failure of the directory collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The directory did not answer in time.
    #[error("directory lookup timed out")]
    Timeout,

    /// Any other directory failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Authorization could not produce a decision.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// Principal or owner resolution failed; the outcome is indeterminate.
    #[error("authorization indeterminate: {0}")]
    Indeterminate(#[from] DirectoryError),

    /// A persisted policy document no longer parses.
    #[error("stored policy document is malformed: {0}")]
    MalformedStoredPolicy(#[source] serde_json::Error),

    /// An allowed policy-management request came from outside the owning account.
    #[error("The specified method is not allowed against this resource.")]
    MethodNotAllowed,
}

impl AuthorizationError {
    /// HTTP status code the caller should respond with.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::Indeterminate(_) => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedStoredPolicy(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}
