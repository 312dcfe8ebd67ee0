use std::time::Duration;

use http::{header::HeaderValue, HeaderName};
use tokio_util::sync::CancellationToken;

use crate::cancel::Cancellable;
use crate::error::Error;
use crate::response::Response;
use crate::{ApiClient, Authentication};

/// Copy the method, URI, version and headers of a request.
pub(crate) fn request_parts<B>(req: &http::Request<B>) -> http::request::Parts {
    let (mut parts, ()) = http::Request::new(()).into_parts();
    parts.method = req.method().clone();
    parts.uri = req.uri().clone();
    parts.version = req.version();
    parts.headers = req.headers().clone();
    parts
}

/// Builder for a single request against an [`ApiClient`].
#[derive(Debug)]
pub struct RequestBuilder<A> {
    req: http::request::Builder,
    client: ApiClient<A>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl<A> RequestBuilder<A> {
    /// Start a request with `method` against `uri`.
    ///
    /// An invalid URI is reported when the request is sent.
    pub fn new(client: ApiClient<A>, uri: String, method: http::Method) -> Self {
        Self {
            req: http::Request::builder().method(method).uri(uri),
            client,
            timeout: None,
            cancel: None,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.req = self.req.header(key, value);
        self
    }

    /// Give up waiting for a response after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the request, and reading its response body, when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Send the request.
    ///
    /// Any status is returned as a [`Response`]; use
    /// [`Response::error_for_status`] to reject failures.
    pub async fn send(self) -> Result<Response, Error>
    where
        A: Authentication,
    {
        let req = self.req.body(hyperdriver::Body::empty())?;

        let client = self.client;
        let timeout = self.timeout;
        let exchange = async move {
            match timeout {
                Some(timeout) => tokio::time::timeout(timeout, client.execute(req))
                    .await
                    .map_err(|_| Error::Timeout(timeout))?,
                None => client.execute(req).await,
            }
        };

        let response = Cancellable::new(exchange, self.cancel.clone()).await?;
        Ok(response.with_cancel(self.cancel))
    }
}
