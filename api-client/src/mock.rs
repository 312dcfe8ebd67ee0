//! An in-memory tower service for exercising API clients in tests.
//!
//! Routes are matched on method and path. Unknown routes answer `404`.
//! Clones share routes and request counters, so a test can keep a handle
//! after moving the service into an [`ApiClient`](crate::ApiClient).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    delay: Option<Duration>,
    hang: bool,
}

impl MockResponse {
    /// An empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
            hang: false,
        }
    }

    /// A JSON response with `status`.
    pub fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).expect("mock body serializes");
        Self::new(status)
            .header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
    }

    /// Add a response header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace the response body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Wait this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Never answer.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    fn to_response(&self) -> http::Response<hyperdriver::Body> {
        let mut response = http::Response::new(hyperdriver::Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

type RouteKey = (Method, String);

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<RouteKey, MockResponse>,
    hits: HashMap<RouteKey, usize>,
}

/// A tower service answering from a table of canned responses.
#[derive(Debug, Default, Clone)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
}

impl MockService {
    /// An empty service; every request gets a `404`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` requests for `path` with `response`, replacing any earlier route.
    pub fn add(&self, method: Method, path: &str, response: MockResponse) -> &Self {
        self.state
            .lock()
            .routes
            .insert((method, path.to_owned()), response);
        self
    }

    /// Answer `GET` requests for `path` with `value` as JSON.
    pub fn get_json<T: serde::Serialize>(&self, path: &str, value: &T) -> &Self {
        self.add(Method::GET, path, MockResponse::json(StatusCode::OK, value))
    }

    /// Forget the route for `method` and `path`, so it answers `404`.
    pub fn remove(&self, method: Method, path: &str) -> &Self {
        self.state.lock().routes.remove(&(method, path.to_owned()));
        self
    }

    /// How many `method` requests arrived for `path`.
    pub fn hits(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .hits
            .get(&(method, path.to_owned()))
            .copied()
            .unwrap_or_default()
    }

    /// How many requests arrived in total.
    pub fn total_hits(&self) -> usize {
        self.state.lock().hits.values().sum()
    }
}

impl tower::Service<http::Request<hyperdriver::Body>> for MockService {
    type Response = http::Response<hyperdriver::Body>;
    type Error = hyperdriver::client::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
        let key = (req.method().clone(), req.uri().path().to_owned());
        let route = {
            let mut state = self.state.lock();
            *state.hits.entry(key.clone()).or_default() += 1;
            state.routes.get(&key).cloned()
        };

        Box::pin(async move {
            let Some(route) = route else {
                tracing::trace!(method = %key.0, path = %key.1, "no mock route");
                return Ok(MockResponse::new(StatusCode::NOT_FOUND).to_response());
            };

            if route.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(route.to_response())
        })
    }
}
