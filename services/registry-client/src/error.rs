//! Error types for the registry client

use http::StatusCode;

/// Result type for registry client operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The registry answered with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("registry returned HTTP {status}: {message}")]
pub struct ApiError {
    /// HTTP status of the response
    pub status: StatusCode,
    /// Body of the response, or a description of why it could not be read
    pub message: String,
}

impl ApiError {
    /// Create an error for `status`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<api_client::HttpResponseError> for ApiError {
    fn from(error: api_client::HttpResponseError) -> Self {
        Self {
            status: error.status,
            message: error.message,
        }
    }
}

/// Error types for registry client operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Non-success response
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The registry refuses deletes (HTTP 405)
    #[error(
        "the registry does not allow deleting from {repository}; \
         enable deletes on the server (REGISTRY_STORAGE_DELETE_ENABLED=true) and try again"
    )]
    DeletionDisabled {
        /// Repository the delete was aimed at
        repository: String,
        /// The `405 Method Not Allowed` response
        #[source]
        source: ApiError,
    },

    /// The operation was cancelled; its result is stale and should be discarded.
    #[error("operation cancelled")]
    Cancelled,

    /// The request could not be sent or its response could not be read
    #[error("transport error: {0}")]
    Transport(#[source] api_client::Error),

    /// A response body was not valid JSON
    #[error("decoding {what}: {source}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// The JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    /// Whether this is the routine outcome of cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistryError::Cancelled)
    }

    /// The HTTP status behind this error, if the registry answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RegistryError::Api(error) | RegistryError::DeletionDisabled { source: error, .. } => {
                Some(error.status)
            }
            _ => None,
        }
    }

    pub(crate) fn decode(what: &'static str, source: serde_json::Error) -> Self {
        RegistryError::Decode { what, source }
    }

    /// Map a `405` from a deletion step to [`RegistryError::DeletionDisabled`].
    pub(crate) fn for_deletion(self, repository: &str) -> Self {
        match self {
            RegistryError::Api(source) if source.status == StatusCode::METHOD_NOT_ALLOWED => {
                RegistryError::DeletionDisabled {
                    repository: repository.to_owned(),
                    source,
                }
            }
            other => other,
        }
    }
}

impl From<api_client::Error> for RegistryError {
    fn from(error: api_client::Error) -> Self {
        match error {
            api_client::Error::Cancelled => RegistryError::Cancelled,
            api_client::Error::Response(response) => RegistryError::Api(response.into()),
            api_client::Error::Decode(source) => RegistryError::decode("response", source),
            other => RegistryError::Transport(other),
        }
    }
}
