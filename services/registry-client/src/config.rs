//! Registry client configuration.

use std::io;
use std::time::Duration;

use api_client::Secret;
use camino::{Utf8Path, Utf8PathBuf};
use http::Uri;
use serde::Deserialize;

use crate::auth::RegistryAuth;

const DEFAULT_CATALOG_TTL: u64 = 30;
const DEFAULT_TAGS_TTL: u64 = 30;
const DEFAULT_MANIFEST_TTL: u64 = 300;
const DEFAULT_SIZE_TTL: u64 = 300;

/// Why a configuration file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("reading {path}: {source}")]
    Io {
        /// Path of the configuration file
        path: Utf8PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML, or is missing required keys
    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How long each kind of registry resource stays cached, in seconds.
///
/// Manifests and cumulative sizes change rarely and are expensive to
/// recompute, so they live longer than catalog and tag listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    /// Repository catalog
    pub catalog: u64,
    /// Per-repository tag lists
    pub tags: u64,
    /// Individual manifests
    pub manifests: u64,
    /// Cumulative size results
    pub sizes: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        CacheTtls {
            catalog: DEFAULT_CATALOG_TTL,
            tags: DEFAULT_TAGS_TTL,
            manifests: DEFAULT_MANIFEST_TTL,
            sizes: DEFAULT_SIZE_TTL,
        }
    }
}

impl CacheTtls {
    /// TTL for the repository catalog.
    pub fn catalog(&self) -> Duration {
        Duration::from_secs(self.catalog)
    }

    /// TTL for tag lists.
    pub fn tags(&self) -> Duration {
        Duration::from_secs(self.tags)
    }

    /// TTL for manifests.
    pub fn manifests(&self) -> Duration {
        Duration::from_secs(self.manifests)
    }

    /// TTL for cumulative sizes.
    pub fn sizes(&self) -> Duration {
        Duration::from_secs(self.sizes)
    }
}

/// Where the registry lives and how to talk to it.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URI of the registry API; endpoints such as `v2/_catalog` are joined onto it.
    #[serde(with = "api_client::uri::serde")]
    pub url: Uri,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[serde(default)]
    pub password: Option<Secret>,

    /// Static bearer token, used when no username is set
    #[serde(default)]
    pub token: Option<Secret>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheTtls,
}

impl RegistryConfig {
    /// Anonymous access to `url` with default cache lifetimes.
    pub fn new(url: Uri) -> Self {
        Self {
            url,
            username: None,
            password: None,
            token: None,
            timeout: None,
            cache: CacheTtls::default(),
        }
    }

    /// Credentials implied by this configuration.
    pub fn auth(&self) -> RegistryAuth {
        match (&self.username, &self.token) {
            (Some(username), _) => RegistryAuth::Basic {
                username: username.clone(),
                password: self.password.clone(),
            },
            (None, Some(token)) => RegistryAuth::Bearer(token.clone()),
            (None, None) => RegistryAuth::Anonymous,
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML configuration file.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Request timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
