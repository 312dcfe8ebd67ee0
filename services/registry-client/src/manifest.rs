//! Image manifests and their storage size.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::lenient::{lenient, lenient_size};

/// Media types sent in the `Accept` header when fetching a manifest.
///
/// Asking for a schema 2 manifest makes the registry report the digest
/// which a later `DELETE` must use.
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// Response header carrying the content digest of a manifest.
pub const CONTENT_DIGEST_HEADER: &str = "docker-content-digest";

/// A reference to a content-addressed blob: the image config or one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Content digest, e.g. `sha256:...`
    #[serde(default)]
    pub digest: String,

    /// Size in bytes
    #[serde(
        default,
        deserialize_with = "lenient_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,

    /// Media type of the referenced blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// One entry in an image's build history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Creation timestamp, RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Command which produced this step
    #[serde(
        default,
        rename = "created_by",
        alias = "createdBy",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_by: Option<String>,
    /// Free-form comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether this step left the filesystem unchanged
    #[serde(
        default,
        rename = "empty_layer",
        alias = "emptyLayer",
        skip_serializing_if = "Option::is_none"
    )]
    pub empty_layer: Option<bool>,
}

/// An image manifest as returned by `GET /v2/{name}/manifests/{reference}`.
///
/// Fields the registry omits, or sends in an unexpected shape, are `None`.
/// Unknown fields are kept in [`Manifest::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version, `2` for current images
    #[serde(default, deserialize_with = "lenient")]
    pub schema_version: Option<u32>,

    /// Media type of the manifest document
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// The image configuration blob
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,

    /// Filesystem layers, base first
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<Descriptor>>,

    /// Build history, one entry per step
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<History>>,

    /// Arbitrary metadata
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Content digest of the manifest itself.
    ///
    /// Registries rarely put this in the body; the client fills it from the
    /// `Docker-Content-Digest` header or by hashing the body.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Precomputed total size, reported by some registries.
    #[serde(
        default,
        deserialize_with = "lenient_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,

    /// Registry extensions this type does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Manifest {
    /// The layers of this manifest, empty when there are none.
    pub fn layers(&self) -> &[Descriptor] {
        self.layers.as_deref().unwrap_or_default()
    }

    /// Parse a manifest body, filling in the digest if the body lacks one.
    ///
    /// `header_digest` is the value of the `Docker-Content-Digest` header.
    /// Without it the digest is the sha256 of `body`.
    pub fn from_response(body: &[u8], header_digest: Option<&str>) -> serde_json::Result<Self> {
        let mut manifest: Manifest = serde_json::from_slice(body)?;
        if manifest.digest.is_none() {
            manifest.digest = Some(match header_digest {
                Some(digest) => digest.to_owned(),
                None => content_digest(body),
            });
        }
        Ok(manifest)
    }
}

/// The `sha256:` content digest of `data`.
pub fn content_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(sha2::Sha256::digest(data)))
}

/// Storage size of one manifest in bytes.
///
/// A manifest which reports a `size` and has no layer list is taken at its
/// word. Otherwise the size is the config blob plus every layer, with missing
/// sizes counted as zero.
pub fn size_of(manifest: &Manifest) -> u64 {
    if let (Some(size), None) = (manifest.size, &manifest.layers) {
        return size;
    }

    let config = manifest
        .config
        .as_ref()
        .and_then(|config| config.size)
        .unwrap_or(0);

    manifest
        .layers()
        .iter()
        .map(|layer| layer.size.unwrap_or(0))
        .fold(config, u64::saturating_add)
}
