//! Per-resource caches and the keys they are stored under.
//!
//! Keys are the registry endpoint a value came from. Derived results, which
//! have no endpoint of their own, append their distinguishing parameters in a
//! canonical order so that equal requests share one entry.

use std::sync::Arc;

use shelflife::TtlCache;

use crate::config::CacheTtls;
use crate::manifest::Manifest;
use crate::size::CumulativeSize;

pub(crate) const CATALOG: &str = "v2/_catalog";
pub(crate) const GARBAGE_COLLECT: &str = "v2/_gc";

pub(crate) fn tags_endpoint(repository: &str) -> String {
    format!("v2/{repository}/tags/list")
}

pub(crate) fn manifest_endpoint(repository: &str, reference: &str) -> String {
    format!("v2/{repository}/manifests/{reference}")
}

fn cumulative_size_prefix(repository: &str) -> String {
    format!("v2/{repository}/cumulative-size?")
}

/// Tags sorted and de-duplicated, so that the order or repetition a caller
/// lists them with does not change the result or its key.
pub(crate) fn canonical_tags(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort_unstable();
    tags.dedup();
    tags
}

/// Key for a cumulative size result over tags already passed through [`canonical_tags`].
pub(crate) fn cumulative_size_key(repository: &str, tags: &[String], shared: bool) -> String {
    format!(
        "{}shared={shared}&tags={}",
        cumulative_size_prefix(repository),
        tags.join(",")
    )
}

/// Every cache the registry client reads through.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegistryCache {
    pub(crate) ttls: CacheTtls,
    pub(crate) catalog: TtlCache<String, Vec<String>>,
    pub(crate) tags: TtlCache<String, Vec<String>>,
    pub(crate) manifests: TtlCache<String, Arc<Manifest>>,
    pub(crate) sizes: TtlCache<String, CumulativeSize>,
}

impl RegistryCache {
    pub(crate) fn new(ttls: CacheTtls) -> Self {
        Self {
            ttls,
            ..Default::default()
        }
    }

    /// Forget everything derived from `repository:tag`, plus the catalog.
    ///
    /// `digest` drops the manifest cached under its digest reference as well.
    pub(crate) fn invalidate_tag(&self, repository: &str, tag: &str, digest: Option<&str>) {
        self.tags.remove(&tags_endpoint(repository));
        self.manifests.remove(&manifest_endpoint(repository, tag));
        if let Some(digest) = digest {
            self.manifests.remove(&manifest_endpoint(repository, digest));
        }

        let prefix = cumulative_size_prefix(repository);
        let sizes = self.sizes.remove_where(|key| key.starts_with(&prefix));
        self.catalog.remove(CATALOG);

        tracing::debug!(%repository, %tag, sizes, "invalidated cached entries");
    }

    pub(crate) fn clear(&self) {
        self.catalog.clear();
        self.tags.clear();
        self.manifests.clear();
        self.sizes.clear();
    }

    /// Drop expired entries from every cache.
    pub(crate) fn sweep(&self) -> usize {
        self.catalog.sweep() + self.tags.sweep() + self.manifests.sweep() + self.sizes.sweep()
    }
}
