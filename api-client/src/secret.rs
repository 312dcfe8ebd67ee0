//! Credentials which must not leak into logs.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A password or token used to talk to a registry.
///
/// The wrapped value is hidden from `Debug` output and zeroed on drop
/// when it was owned. Use [`Secret::revealed`] to get at it.
#[derive(Clone, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub struct Secret(Cow<'static, str>);

impl Secret {
    /// Expose the underlying value.
    pub fn revealed(&self) -> &str {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        if let Cow::Owned(ref mut s) = self.0 {
            s.zeroize()
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value.into())
    }
}

impl From<&'static str> for Secret {
    fn from(value: &'static str) -> Self {
        Secret(value.into())
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.revealed().to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secret_hidden_debug() {
        let secret = Secret::from("hunter2");

        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(&format!("{secret:?}"), "Secret(****)");
        assert_eq!(secret.revealed(), "hunter2");
    }
}
