//! # Registry explorer client
//!
//! Aggregated, cached views over the [OCI distribution API] of a container
//! image registry:
//!
//! - every repository with its tags ([`RegistryClient::fetch_all_images`]),
//! - a single manifest ([`RegistryClient::fetch_manifest`]),
//! - the storage used by several tags, counting shared layers once
//!   ([`RegistryClient::cumulative_size`]),
//! - deleting a tag ([`RegistryClient::delete_tag`]).
//!
//! Responses are cached per resource kind for the lifetimes in [`CacheTtls`].
//! Every operation takes a [`CancellationToken`]; cancelling it aborts
//! in-flight requests and resolves the operation with
//! [`RegistryError::Cancelled`], which callers should discard quietly.
//! Fan-out requests run concurrently on the calling task.
//!
//! ## Example
//!
//! ```no_run
//! use registry_client::{RegistryClient, RegistryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RegistryClient::new(RegistryConfig::new("https://registry.example/".parse()?));
//! let cancel = CancellationToken::new();
//!
//! for image in client.fetch_all_images(&cancel).await? {
//!     println!("{}: {}", image.name, image.tags.join(", "));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [OCI distribution API]: https://github.com/opencontainers/distribution-spec

use std::time::Duration;

use api_client::{ApiClient, RequestBuilder, Response};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

mod auth;
mod cache;
mod catalog;
mod config;
mod delete;
mod error;
mod image;
mod lenient;
pub mod manifest;
mod size;
mod supersede;

pub use self::auth::RegistryAuth;
pub use self::config::{CacheTtls, ConfigError, RegistryConfig};
pub use self::delete::GcOutcome;
pub use self::error::{ApiError, RegistryError, RegistryResult};
pub use self::image::{compare_tags, sort_tags, Image};
pub use self::manifest::{size_of, Descriptor, Manifest};
pub use self::size::CumulativeSize;
pub use self::supersede::Supersede;

use self::cache::RegistryCache;

/// Fail fast when `cancel` has already fired.
pub(crate) fn ensure_live(cancel: &CancellationToken) -> RegistryResult<()> {
    if cancel.is_cancelled() {
        tracing::trace!("already cancelled");
        return Err(RegistryError::Cancelled);
    }
    Ok(())
}

/// A caching client for one registry.
///
/// Clones share the connection pool and the cache.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    api: ApiClient<RegistryAuth>,
    cache: RegistryCache,
    timeout: Option<Duration>,
}

impl RegistryClient {
    /// Connect to the registry described by `config`.
    pub fn new(config: RegistryConfig) -> Self {
        let api = ApiClient::new(config.url.clone(), config.auth());
        Self {
            api,
            cache: RegistryCache::new(config.cache),
            timeout: config.timeout(),
        }
    }

    /// Send requests through an existing [`ApiClient`], for example one backed
    /// by [`api_client::mock::MockService`].
    pub fn with_api_client(api: ApiClient<RegistryAuth>, ttls: CacheTtls) -> Self {
        Self {
            api,
            cache: RegistryCache::new(ttls),
            timeout: None,
        }
    }

    /// Give up on any single request after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use new credentials for subsequent requests.
    ///
    /// Cached responses were fetched with the old credentials, so this also
    /// clears the cache.
    pub fn refresh_auth(&self, auth: RegistryAuth) {
        self.api.refresh_auth(auth);
        self.clear_cache();
    }

    /// Forget every cached response.
    pub fn clear_cache(&self) {
        tracing::debug!("clearing registry cache");
        self.cache.clear();
    }

    /// Drop expired cache entries, returning how many were dropped.
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }

    /// Send `request` bound to `cancel`, rejecting non-success statuses.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder<RegistryAuth>,
        cancel: &CancellationToken,
    ) -> RegistryResult<Response> {
        let request = request.cancel_on(cancel.clone());
        let request = match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };

        let response = request.send().await?.error_for_status().await?;
        Ok(response)
    }

    /// Send `request` and read the whole body.
    pub(crate) async fn get_bytes(
        &self,
        request: RequestBuilder<RegistryAuth>,
        cancel: &CancellationToken,
    ) -> RegistryResult<Bytes> {
        let response = self.send(request, cancel).await?;
        Ok(response.bytes().await?)
    }
}
