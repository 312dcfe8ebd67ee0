//! Error types for API Clients
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while sending or recieving an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a non-success status
    #[error(transparent)]
    Response(HttpResponseError),

    /// An error occured while recieving the response body
    #[error("Error reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// The response body was not the JSON we expected
    #[error("Error decoding response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// An error occured while sending the request
    #[error(transparent)]
    Request(hyperdriver::client::Error),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    Build(#[from] http::Error),

    /// No response arrived before the deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The cancellation token attached to the request fired
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error is the routine outcome of a cancelled request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The HTTP status, when the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Response(response) => Some(response.status),
            _ => None,
        }
    }
}

impl From<HttpResponseError> for Error {
    fn from(error: HttpResponseError) -> Self {
        Error::Response(error)
    }
}

/// A server returned an error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseError {
    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The message body of the response
    pub message: String,
}

impl HttpResponseError {
    /// Create a new error from a status and a message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} response: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpResponseError {}
