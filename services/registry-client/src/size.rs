//! Storage footprint of a repository across several tags.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{canonical_tags, cumulative_size_key};
use crate::error::{RegistryError, RegistryResult};
use crate::manifest::{size_of, Manifest};
use crate::{ensure_live, RegistryClient};

/// Combined size of several tags of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CumulativeSize {
    /// Sum of every tag's manifest size. Layers shared between tags are counted once per tag.
    pub total_size: u64,

    /// Sum of every distinct layer, each counted once.
    ///
    /// Equal to `total_size` when shared layers are not accounted for.
    pub unique_size: u64,

    /// Size of each tag whose manifest could be fetched
    pub tag_sizes: BTreeMap<String, u64>,

    /// Distinct layer digests seen, empty when shared layers are not accounted for
    pub layer_digests: BTreeSet<String>,
}

/// Accumulates manifests into a [`CumulativeSize`].
#[derive(Debug, Default)]
struct SizeTally {
    shared: bool,
    total: u64,
    tag_sizes: BTreeMap<String, u64>,
    layers: HashMap<String, u64>,
    anonymous: u64,
}

impl SizeTally {
    fn new(shared: bool) -> Self {
        Self {
            shared,
            ..Default::default()
        }
    }

    fn add(&mut self, tag: &str, manifest: &Manifest) {
        let size = size_of(manifest);
        self.total = self.total.saturating_add(size);
        self.tag_sizes.insert(tag.to_owned(), size);

        if !self.shared {
            return;
        }

        for layer in manifest.layers() {
            let size = layer.size.unwrap_or(0);
            if layer.digest.is_empty() {
                // Nothing to de-duplicate against.
                self.anonymous = self.anonymous.saturating_add(size);
            } else {
                self.layers.insert(layer.digest.clone(), size);
            }
        }
    }

    fn finish(self) -> CumulativeSize {
        if !self.shared {
            return CumulativeSize {
                total_size: self.total,
                unique_size: self.total,
                tag_sizes: self.tag_sizes,
                layer_digests: BTreeSet::new(),
            };
        }

        let unique_size = self
            .layers
            .values()
            .copied()
            .fold(self.anonymous, u64::saturating_add);

        CumulativeSize {
            total_size: self.total,
            unique_size,
            tag_sizes: self.tag_sizes,
            layer_digests: self.layers.into_keys().collect(),
        }
    }
}

impl RegistryClient {
    /// Total and de-duplicated size of `tags` in `repository`.
    ///
    /// Manifests are fetched concurrently through the manifest cache. A tag
    /// whose manifest cannot be fetched is logged and left out of the result;
    /// cancellation fails the whole computation. A tag listed twice is counted
    /// once. The result is cached as a unit under the repository, the set of
    /// tags, and `account_for_shared_layers`.
    #[tracing::instrument(skip(self, tags, cancel), fields(tag_count = tags.len()))]
    pub async fn cumulative_size(
        &self,
        repository: &str,
        tags: &[String],
        account_for_shared_layers: bool,
        cancel: &CancellationToken,
    ) -> RegistryResult<CumulativeSize> {
        ensure_live(cancel)?;

        let tags = canonical_tags(tags);
        let key = cumulative_size_key(repository, &tags, account_for_shared_layers);
        self.cache
            .sizes
            .with_cache(key, self.cache.ttls.sizes(), || async {
                let fetches = tags.iter().map(|tag| async move {
                    let manifest = self.fetch_manifest(repository, tag, cancel).await;
                    (tag, manifest)
                });
                let manifests = join_all(fetches).await;
                ensure_live(cancel)?;

                let mut tally = SizeTally::new(account_for_shared_layers);
                for (tag, manifest) in manifests {
                    match manifest {
                        Ok(manifest) => tally.add(tag, &manifest),
                        Err(error) if error.is_cancelled() => return Err(RegistryError::Cancelled),
                        Err(error) => {
                            tracing::warn!(%tag, %error, "leaving tag out of cumulative size");
                        }
                    }
                }

                Ok::<_, RegistryError>(tally.finish())
            })
            .await
    }
}

#[cfg(test)]
mod test {
    use crate::manifest::Descriptor;

    use super::*;

    fn manifest(layers: &[(&str, u64)]) -> Manifest {
        Manifest {
            layers: Some(
                layers
                    .iter()
                    .map(|(digest, size)| Descriptor {
                        digest: digest.to_string(),
                        size: Some(*size),
                        media_type: None,
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn shared_layers_are_counted_once() {
        let mut tally = SizeTally::new(true);
        tally.add("1", &manifest(&[("sha256:base", 500), ("sha256:one", 100)]));
        tally.add("2", &manifest(&[("sha256:base", 500), ("sha256:two", 100)]));
        let size = tally.finish();

        assert_eq!(size.total_size, 1200);
        assert_eq!(size.unique_size, 700);
        assert_eq!(size.layer_digests.len(), 3);
        assert_eq!(size.tag_sizes["1"], 600);
        assert_eq!(size.tag_sizes["2"], 600);
    }

    #[test]
    fn without_sharing_unique_equals_total() {
        let mut tally = SizeTally::new(false);
        tally.add("1", &manifest(&[("sha256:base", 500), ("sha256:one", 100)]));
        tally.add("2", &manifest(&[("sha256:base", 500)]));
        let size = tally.finish();

        assert_eq!(size.total_size, 1100);
        assert_eq!(size.unique_size, 1100);
        assert!(size.layer_digests.is_empty());
    }

    #[test]
    fn layers_without_digest_are_not_merged() {
        let mut tally = SizeTally::new(true);
        tally.add("1", &manifest(&[("", 10)]));
        tally.add("2", &manifest(&[("", 10)]));
        let size = tally.finish();

        assert_eq!(size.unique_size, 20);
        assert!(size.layer_digests.is_empty());
    }

    #[test]
    fn no_tags_is_empty() {
        assert_eq!(SizeTally::new(true).finish(), CumulativeSize::default());
    }
}
