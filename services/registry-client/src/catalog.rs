//! Repository listings, tag listings and manifests.

use std::sync::Arc;

use futures::future::join_all;
use http::header::ACCEPT;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{manifest_endpoint, tags_endpoint, CATALOG};
use crate::error::{RegistryError, RegistryResult};
use crate::image::Image;
use crate::lenient::lenient;
use crate::manifest::{Manifest, CONTENT_DIGEST_HEADER, MANIFEST_ACCEPT};
use crate::{ensure_live, RegistryClient};

/// Body of `GET /v2/_catalog`
#[derive(Debug, Default, Deserialize)]
struct Catalog {
    #[serde(default, deserialize_with = "lenient")]
    repositories: Option<Vec<String>>,
}

/// Body of `GET /v2/{name}/tags/list`
#[derive(Debug, Default, Deserialize)]
struct TagList {
    #[serde(default, deserialize_with = "lenient")]
    tags: Option<Vec<String>>,
}

impl RegistryClient {
    /// Names of every repository in the registry.
    #[tracing::instrument(skip_all)]
    pub async fn fetch_catalog(&self, cancel: &CancellationToken) -> RegistryResult<Vec<String>> {
        ensure_live(cancel)?;

        self.cache
            .catalog
            .with_cache(CATALOG.to_owned(), self.cache.ttls.catalog(), || async {
                let body = self.get_bytes(self.api.get(CATALOG), cancel).await?;
                let catalog: Catalog = serde_json::from_slice(&body)
                    .map_err(|error| RegistryError::decode("catalog", error))?;
                Ok::<_, RegistryError>(catalog.repositories.unwrap_or_default())
            })
            .await
    }

    /// Tags of `repository`, in the order the registry lists them.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn fetch_tags(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> RegistryResult<Vec<String>> {
        ensure_live(cancel)?;

        let endpoint = tags_endpoint(repository);
        self.cache
            .tags
            .with_cache(endpoint.clone(), self.cache.ttls.tags(), || async {
                let body = self.get_bytes(self.api.get(&endpoint), cancel).await?;
                let list: TagList = serde_json::from_slice(&body)
                    .map_err(|error| RegistryError::decode("tag list", error))?;
                Ok::<_, RegistryError>(list.tags.unwrap_or_default())
            })
            .await
    }

    /// Every repository together with its tags, sorted by name.
    ///
    /// Tags are fetched for all repositories at once, each under a child of
    /// `cancel`. A repository whose tags cannot be fetched is still listed,
    /// with no tags. Only a failure to read the catalog, or cancellation,
    /// fails the call.
    #[tracing::instrument(skip_all)]
    pub async fn fetch_all_images(&self, cancel: &CancellationToken) -> RegistryResult<Vec<Image>> {
        ensure_live(cancel)?;

        let repositories = self.fetch_catalog(cancel).await?;
        tracing::debug!(count = repositories.len(), "fetching tags");

        let fetches = repositories.into_iter().map(|repository| {
            let child = cancel.child_token();
            async move {
                let tags = self.fetch_tags(&repository, &child).await;
                (repository, tags)
            }
        });
        let results = join_all(fetches).await;
        ensure_live(cancel)?;

        let mut images = Vec::with_capacity(results.len());
        for (repository, tags) in results {
            let tags = match tags {
                Ok(tags) => tags,
                Err(error) if error.is_cancelled() => return Err(RegistryError::Cancelled),
                Err(error) => {
                    tracing::warn!(%repository, %error, "listing repository without tags");
                    Vec::new()
                }
            };
            images.push(Image::new(repository, tags));
        }

        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }

    /// The manifest `repository:reference`, where `reference` is a tag or digest.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn fetch_manifest(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> RegistryResult<Arc<Manifest>> {
        ensure_live(cancel)?;

        self.cache
            .manifests
            .with_cache(
                manifest_endpoint(repository, reference),
                self.cache.ttls.manifests(),
                || async {
                    self.fetch_manifest_uncached(repository, reference, cancel)
                        .await
                        .map(Arc::new)
                },
            )
            .await
    }

    /// Fetch a manifest straight from the registry, skipping the cache.
    pub(crate) async fn fetch_manifest_uncached(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> RegistryResult<Manifest> {
        let request = self
            .api
            .get(&manifest_endpoint(repository, reference))
            .header(ACCEPT, MANIFEST_ACCEPT);
        let response = self.send(request, cancel).await?;

        let digest = response
            .headers()
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Manifest::from_response(&body, digest.as_deref())
            .map_err(|error| RegistryError::decode("manifest", error))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn catalog_tolerates_missing_and_malformed_lists() {
        let catalog: Catalog = serde_json::from_str("{}").unwrap();
        assert_eq!(catalog.repositories, None);

        let catalog: Catalog = serde_json::from_str(r#"{"repositories": "app"}"#).unwrap();
        assert_eq!(catalog.repositories, None);

        let tags: TagList = serde_json::from_str(r#"{"name": "app", "tags": null}"#).unwrap();
        assert_eq!(tags.tags.unwrap_or_default(), Vec::<String>::new());
    }
}
