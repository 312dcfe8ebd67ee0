//! Response wrapper which remembers the request that produced it.

use bytes::Bytes;
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use tokio_util::sync::CancellationToken;

use crate::cancel::Cancellable;
use crate::error::{Error, HttpResponseError};

/// An HTTP response, with easy access to the request parts that produced it.
///
/// If the request carried a cancellation token, reading the body honours
/// the same token.
#[derive(Debug)]
pub struct Response {
    request: http::request::Parts,
    response: http::response::Parts,
    body: Body,
    cancel: Option<CancellationToken>,
}

impl Response {
    /// Create a new `Response` instance.
    pub fn new(request: http::request::Parts, response: http::Response<Body>) -> Self {
        let (response, body) = response.into_parts();

        Self {
            request,
            response,
            body,
            cancel: None,
        }
    }

    pub(crate) fn with_cancel(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The status code of the response.
    pub fn status(&self) -> http::StatusCode {
        self.response.status
    }

    /// The headers of the response.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.response.headers
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let Response { body, cancel, .. } = self;
        let collect = async move {
            let collected = body
                .collect()
                .await
                .map_err(|err| Error::ResponseBody(err.into()))?;
            Ok(collected.to_bytes())
        };
        Cancellable::new(collect, cancel).await
    }

    /// Collect the body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|err| Error::ResponseBody(err.into()))
    }

    /// Collect the body and deserialize it as JSON.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Pass successful responses through, turn every other status into an [`Error::Response`].
    ///
    /// The body of a failed response becomes the error message.
    pub async fn error_for_status(self) -> Result<Self, Error> {
        if self.status().is_success() {
            return Ok(self);
        }

        let status = self.status();
        tracing::debug!(
            method = %self.request.method,
            uri = %self.request.uri,
            %status,
            "request failed"
        );
        let message = match self.text().await {
            Ok(text) => text,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => format!("Failed to read response body: {err}"),
        };
        Err(HttpResponseError::new(status, message).into())
    }
}
