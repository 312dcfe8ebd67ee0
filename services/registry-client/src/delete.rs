//! Deleting tags and reclaiming their storage.

use http::header::ACCEPT;
use http::StatusCode;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{manifest_endpoint, GARBAGE_COLLECT};
use crate::error::{RegistryError, RegistryResult};
use crate::manifest::MANIFEST_ACCEPT;
use crate::{ensure_live, RegistryClient};

const MANUAL_GC_INSTRUCTIONS: &str = "this registry does not run garbage collection over HTTP; \
     on the registry host run `registry garbage-collect /etc/docker/registry/config.yml` \
     (add `--delete-untagged` to also remove untagged manifests), then restart the registry";

/// Result of asking the registry to collect unreferenced blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GcOutcome {
    /// The registry accepted the request
    Completed,

    /// The registry has no garbage collection endpoint; an operator must run it.
    Manual {
        /// What to run, and where
        instructions: String,
    },
}

impl RegistryClient {
    /// Delete `repository:tag`.
    ///
    /// The tag is resolved to its manifest digest with a fresh, uncached fetch,
    /// and the manifest is deleted by digest. Without `force`, a failure at
    /// either step is returned and no cache entry is touched. With `force`,
    /// failures are logged and the delete reports success regardless.
    ///
    /// On success the repository's tag list, the tag's manifest, every cumulative
    /// size computed for the repository, and the catalog are dropped from the cache.
    ///
    /// A registry which rejects deletes with `405 Method Not Allowed` produces
    /// [`RegistryError::DeletionDisabled`].
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_tag(
        &self,
        repository: &str,
        tag: &str,
        force: bool,
        cancel: &CancellationToken,
    ) -> RegistryResult<()> {
        ensure_live(cancel)?;

        let digest = match self.fetch_manifest_uncached(repository, tag, cancel).await {
            Ok(manifest) => manifest.digest,
            Err(error) if error.is_cancelled() => return Err(RegistryError::Cancelled),
            Err(error) if force => {
                tracing::warn!(%error, "could not resolve digest, continuing because of force");
                None
            }
            Err(error) => return Err(error.for_deletion(repository)),
        };

        if let Some(digest) = digest.as_deref() {
            let request = self
                .api
                .delete(&manifest_endpoint(repository, digest))
                .header(ACCEPT, MANIFEST_ACCEPT);

            match self.send(request, cancel).await {
                Ok(_) => tracing::debug!(%digest, "deleted manifest"),
                Err(error) if error.is_cancelled() => {
                    // The delete may already have reached the registry.
                    self.cache.invalidate_tag(repository, tag, Some(digest));
                    return Err(RegistryError::Cancelled);
                }
                Err(error) if force => {
                    tracing::warn!(%digest, %error, "delete failed, continuing because of force");
                }
                Err(error) => return Err(error.for_deletion(repository)),
            }
        }

        self.cache.invalidate_tag(repository, tag, digest.as_deref());
        Ok(())
    }

    /// Ask the registry to reclaim blobs no manifest refers to any more.
    ///
    /// Registries without a `POST /v2/_gc` endpoint (HTTP 404, 405 or 501)
    /// produce [`GcOutcome::Manual`]. After a completed collection the whole
    /// cache is cleared.
    #[tracing::instrument(skip_all)]
    pub async fn garbage_collect(&self, cancel: &CancellationToken) -> RegistryResult<GcOutcome> {
        ensure_live(cancel)?;

        match self.send(self.api.post(GARBAGE_COLLECT), cancel).await {
            Ok(_) => {
                self.cache.clear();
                Ok(GcOutcome::Completed)
            }
            Err(RegistryError::Api(error))
                if matches!(
                    error.status,
                    StatusCode::NOT_FOUND
                        | StatusCode::METHOD_NOT_ALLOWED
                        | StatusCode::NOT_IMPLEMENTED
                ) =>
            {
                tracing::debug!(status = %error.status, "garbage collection is not available over HTTP");
                Ok(GcOutcome::Manual {
                    instructions: MANUAL_GC_INSTRUCTIONS.to_owned(),
                })
            }
            Err(error) => Err(error),
        }
    }
}
