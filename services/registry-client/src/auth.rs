//! Credentials attached to registry requests.

use api_client::{basic_auth, bearer_auth, Authentication, Secret};
use http::header::AUTHORIZATION;

/// How the client identifies itself to the registry.
///
/// Token exchange is left to the caller: a bearer token obtained elsewhere
/// can be installed with [`RegistryClient::refresh_auth`](crate::RegistryClient::refresh_auth).
#[derive(Debug, Clone, Default)]
pub enum RegistryAuth {
    /// No `Authorization` header
    #[default]
    Anonymous,

    /// HTTP basic authentication
    Basic {
        /// Account name
        username: String,
        /// Account password, if any
        password: Option<Secret>,
    },

    /// A pre-issued bearer token
    Bearer(Secret),
}

impl Authentication for RegistryAuth {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        let header = match self {
            RegistryAuth::Anonymous => None,
            RegistryAuth::Basic { username, password } => Some(basic_auth(
                username,
                password.as_ref().map(Secret::revealed),
            )),
            RegistryAuth::Bearer(token) => {
                let header = bearer_auth(token);
                if header.is_none() {
                    tracing::warn!("bearer token is not a valid header value, sending request without it");
                }
                header
            }
        };

        if let Some(header) = header {
            req.headers_mut().insert(AUTHORIZATION, header);
        }
        req
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn authorization(auth: &RegistryAuth) -> Option<String> {
        let req = auth.authenticate(http::Request::new(()));
        req.headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap().to_owned())
    }

    #[test]
    fn anonymous_sends_nothing() {
        assert_eq!(authorization(&RegistryAuth::Anonymous), None);
    }

    #[test]
    fn basic() {
        let auth = RegistryAuth::Basic {
            username: "robot".into(),
            password: Some("beep".into()),
        };
        assert_eq!(authorization(&auth).unwrap(), "Basic cm9ib3Q6YmVlcA==");
    }

    #[test]
    fn bearer() {
        let auth = RegistryAuth::Bearer("abc".into());
        assert_eq!(authorization(&auth).unwrap(), "Bearer abc");
    }
}
