//! A small HTTP API client built on hyperdriver and tower.
//!
//! Every request may carry a [`CancellationToken`](tokio_util::sync::CancellationToken):
//! when it fires, the exchange and any pending body read resolve to
//! [`Error::Cancelled`], which callers treat as routine rather than a failure.
#![allow(clippy::arc_with_non_send_sync)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
use tower::ServiceExt;

mod authentication;
mod cancel;
pub mod error;
pub mod mock;
pub mod request;
pub mod response;
mod secret;
pub mod uri;

pub use self::authentication::{
    basic_auth, bearer_auth, Authentication, AuthenticationLayer, AuthenticationService,
};
pub use self::cancel::Cancellable;
pub use self::error::{Error, HttpResponseError};
pub use self::request::RequestBuilder;
pub use self::response::Response;
pub use self::secret::Secret;
use self::uri::UriExtension as _;

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients.
#[derive(Debug, Clone)]
pub struct ApiClient<A> {
    base: Arc<ArcSwap<Uri>>,
    inner: hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>,
    authentication: Arc<ArcSwap<A>>,
}

impl<A> ApiClient<A>
where
    A: Authentication + Send + Sync + 'static,
{
    /// Create a new API Client from a base URL and an authentication method
    pub fn new(base: Uri, authentication: A) -> Self {
        let authentication = Arc::new(ArcSwap::new(Arc::new(authentication)));
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .layer(AuthenticationLayer::new(authentication.clone()))
            .build_service();

        ApiClient {
            base: Arc::new(ArcSwap::new(Arc::new(base))),
            inner,
            authentication,
        }
    }

    /// Create a client which sends requests through `inner` instead of the network.
    pub fn new_with_inner_service<S>(base: Uri, authentication: A, inner: S) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let authentication = Arc::new(ArcSwap::new(Arc::new(authentication)));

        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .layer(AuthenticationLayer::new(authentication.clone()))
            .service(inner);

        ApiClient {
            base: Arc::new(ArcSwap::new(Arc::new(base))),
            inner: service,
            authentication,
        }
    }

    /// Replace the credentials used for subsequent requests.
    pub fn refresh_auth(&self, authentication: A) {
        self.authentication.store(Arc::new(authentication));
    }
}

impl<A> ApiClient<A>
where
    A: Authentication,
{
    fn request(&self, endpoint: &str, method: Method) -> RequestBuilder<A> {
        let url = self.base.load().join(endpoint);
        RequestBuilder::new(self.clone(), url, method)
    }

    /// Build a GET request for `endpoint`, relative to the base URI.
    pub fn get(&self, endpoint: &str) -> RequestBuilder<A> {
        self.request(endpoint, Method::GET)
    }

    /// Build a POST request for `endpoint`, relative to the base URI.
    pub fn post(&self, endpoint: &str) -> RequestBuilder<A> {
        self.request(endpoint, Method::POST)
    }

    /// Build a DELETE request for `endpoint`, relative to the base URI.
    pub fn delete(&self, endpoint: &str) -> RequestBuilder<A> {
        self.request(endpoint, Method::DELETE)
    }

    /// Send a fully built request.
    pub async fn execute(
        &self,
        req: http::Request<hyperdriver::Body>,
    ) -> Result<Response, Error> {
        let parts = request::request_parts(&req);
        tracing::trace!(method = %parts.method, uri = %parts.uri, "sending request");

        let response = self
            .inner
            .clone()
            .oneshot(req)
            .await
            .map_err(Error::Request)?;
        Ok(Response::new(parts, response))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use http::StatusCode;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::mock::{MockResponse, MockService};

    fn client(mock: &MockService) -> ApiClient<()> {
        ApiClient::new_with_inner_service("http://registry.test/".parse().unwrap(), (), mock.clone())
    }

    #[derive(Debug, Clone)]
    struct Robot;

    impl Authentication for Robot {
        fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
            req.headers_mut()
                .insert(http::header::AUTHORIZATION, basic_auth("robot", Some("beep")));
            req
        }
    }

    #[test]
    fn extensions_produce_send_futures() {
        let client = client(&MockService::new());
        let builder = client.get("v2/");

        fn assert_send<T: Send>(_t: T) {}

        let fut = builder.send();
        assert_send(fut);
    }

    #[tokio::test]
    async fn mock_client_works() {
        let mock = MockService::new();
        mock.get_json("/v2/_catalog", &serde_json::json!({"repositories": ["app"]}));

        let client = client(&mock);
        let response = client.get("v2/_catalog").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["repositories"][0], "app");
        assert_eq!(mock.hits(Method::GET, "/v2/_catalog"), 1);
    }

    #[tokio::test]
    async fn error_for_status_keeps_status_and_body() {
        let mock = MockService::new();
        mock.add(
            Method::DELETE,
            "/v2/app/manifests/sha256:abc",
            MockResponse::new(StatusCode::METHOD_NOT_ALLOWED).body("deletes disabled"),
        );

        let client = client(&mock);
        let err = client
            .delete("v2/app/manifests/sha256:abc")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
        match err {
            Error::Response(response) => assert_eq!(response.message, "deletes disabled"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let mock = MockService::new();
        let response = client(&mock).get("v2/nothing").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_request_resolves_to_cancelled() {
        let mock = MockService::new();
        mock.add(Method::GET, "/v2/_catalog", MockResponse::new(StatusCode::OK).hang());

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let err = client(&mock)
            .get("v2/_catalog")
            .cancel_on(token)
            .send()
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_times_out() {
        let mock = MockService::new();
        mock.add(
            Method::GET,
            "/v2/",
            MockResponse::new(StatusCode::OK).delay(Duration::from_secs(10)),
        );

        let err = client(&mock)
            .get("v2/")
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn authentication_is_applied() {
        #[derive(Debug, Clone, Default)]
        struct Capture(Arc<parking_lot::Mutex<Option<http::HeaderValue>>>);

        impl tower::Service<http::Request<hyperdriver::Body>> for Capture {
            type Response = http::Response<hyperdriver::Body>;
            type Error = hyperdriver::client::Error;
            type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

            fn poll_ready(
                &mut self,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<Result<(), Self::Error>> {
                std::task::Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
                *self.0.lock() = req.headers().get(http::header::AUTHORIZATION).cloned();
                std::future::ready(Ok(http::Response::new(hyperdriver::Body::empty())))
            }
        }

        let capture = Capture::default();
        let client = ApiClient::new_with_inner_service(
            "http://registry.test/".parse().unwrap(),
            Robot,
            capture.clone(),
        );
        client.get("v2/").send().await.unwrap();

        let header = capture.0.lock().clone().unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic cm9ib3Q6YmVlcA==");
    }
}
