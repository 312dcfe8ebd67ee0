//! Keep only the latest fetch of a resource alive.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Hands out cancellation tokens for one logical resource, cancelling the
/// previous token each time a new one is issued.
///
/// A view which refetches, say, the image list whenever the user asks calls
/// [`Supersede::next`] per fetch. Earlier fetches still in flight resolve to
/// [`RegistryError::Cancelled`](crate::RegistryError::Cancelled) and their
/// results are dropped, so only the newest fetch can publish.
#[derive(Debug, Default)]
pub struct Supersede {
    parent: Option<CancellationToken>,
    current: Mutex<Option<CancellationToken>>,
}

impl Supersede {
    /// Tokens are independent of any other cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens are also cancelled when `parent` is.
    pub fn with_parent(parent: CancellationToken) -> Self {
        Self {
            parent: Some(parent),
            current: Mutex::new(None),
        }
    }

    /// Cancel the outstanding token, if any, and issue a fresh one.
    pub fn next(&self) -> CancellationToken {
        let token = match &self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        if let Some(previous) = self.current.lock().replace(token.clone()) {
            tracing::trace!("superseding previous fetch");
            previous.cancel();
        }
        token
    }

    /// Cancel the outstanding token without issuing another.
    pub fn cancel(&self) {
        if let Some(previous) = self.current.lock().take() {
            previous.cancel();
        }
    }
}

impl Drop for Supersede {
    fn drop(&mut self) {
        self.cancel();
    }
}
