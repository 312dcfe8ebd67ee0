//! URI utilities.

use camino::Utf8Path;
use http::Uri;

/// Serialize and Deserialize a URI to and from a string.
pub mod serde {
    use http::Uri;
    use serde::{Deserialize as _, Deserializer};

    /// Deserialize a URI from a string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Uri, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }

    /// Serialize a URI as a string
    pub fn serialize<S>(uri: &Uri, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(uri)
    }
}

/// Extension trait for URIs.
pub trait UriExtension {
    /// Join a path onto the path of this URI, dropping any query.
    ///
    /// Relative paths extend the base path, absolute paths replace it.
    fn join<P: AsRef<str>>(&self, path: P) -> String;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(&self, path: P) -> String {
        let joined = Utf8Path::new(self.path()).join(path.as_ref());

        let mut uri = String::new();
        if let Some(scheme) = self.scheme_str() {
            uri.push_str(scheme);
            uri.push_str("://");
        }
        if let Some(authority) = self.authority() {
            uri.push_str(authority.as_str());
        }
        if !joined.as_str().starts_with('/') {
            uri.push('/');
        }
        uri.push_str(joined.as_str());
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(base: &str, path: &str) -> String {
        base.parse::<Uri>().unwrap().join(path)
    }

    #[test]
    fn test_uri_join() {
        assert_eq!(join("http://registry.test", "v2/_catalog"), "http://registry.test/v2/_catalog");
        assert_eq!(join("http://registry.test/", "v2/_catalog"), "http://registry.test/v2/_catalog");
        assert_eq!(
            join("https://registry.test/api", "v2/library/nginx/tags/list"),
            "https://registry.test/api/v2/library/nginx/tags/list"
        );
        assert_eq!(
            join("https://registry.test/api/", "v2/app/manifests/sha256:abc"),
            "https://registry.test/api/v2/app/manifests/sha256:abc"
        );
        assert_eq!(join("http://registry.test/api", "/v2/"), "http://registry.test/v2/");
    }

    #[test]
    fn test_uri_join_empty() {
        assert_eq!(join("http://registry.test", ""), "http://registry.test/");
        assert_eq!(join("http://registry.test/api", ""), "http://registry.test/api/");
    }

    #[test]
    fn test_uri_join_drops_query() {
        assert_eq!(join("http://registry.test/api?x=1", "v2/"), "http://registry.test/api/v2/");
    }
}
