//! Licensing session ownership.

use crate::dispatch::ProviderChain;
use crate::errors::LicprobeError;
use std::sync::Arc;

/// Exclusive owner of one native session token.
///
/// A handle is only ever constructed around a nonzero token and is closed
/// exactly once: explicitly via [`close`](SessionHandle::close), or on drop.
/// After the first close the handle is terminal; token access fails with
/// `InvalidSession`. The handle is not clonable and performs no internal
/// locking — one in-flight call per session at a time is the caller's
/// contract.
pub struct SessionHandle {
    token: usize,
    chain: Arc<ProviderChain>,
    open: bool,
}

impl SessionHandle {
    /// Open a session through the provider chain.
    ///
    /// # Errors
    /// - `CapabilityNotPresent` - no provider exports the open operation
    /// - `NativeCallFailed` - a provider failed the open call
    /// - `SessionUnavailable` - the open call produced a null token
    pub(crate) fn open(chain: Arc<ProviderChain>) -> Result<Self, LicprobeError> {
        let token = chain.open_session()?;
        if token == 0 {
            return Err(LicprobeError::SessionUnavailable);
        }
        tracing::info!(token, "licensing session opened");
        Ok(Self {
            token,
            chain,
            open: true,
        })
    }

    /// Whether the session has not yet been closed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The native token, while the session is open.
    pub(crate) fn token(&self) -> Result<usize, LicprobeError> {
        if self.open {
            Ok(self.token)
        } else {
            Err(LicprobeError::InvalidSession)
        }
    }

    /// Close the session. The second and later calls are no-ops; close
    /// failures are swallowed since no recovery action exists.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        match self.chain.close_session(self.token) {
            Ok(()) => tracing::info!(token = self.token, "licensing session closed"),
            Err(error) => tracing::warn!(token = self.token, %error, "session close failed"),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;
    use crate::provider::CallError;

    fn chain_with(primary: FakeProvider) -> Arc<ProviderChain> {
        Arc::new(ProviderChain::new(
            Arc::new(primary),
            Arc::new(FakeProvider::absent("secondary")),
        ))
    }

    #[test]
    fn open_produces_live_handle() {
        let chain = chain_with(FakeProvider::absent("primary").with_open(Ok(0x40)).with_close());
        let handle = SessionHandle::open(chain).unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.token().unwrap(), 0x40);
    }

    #[test]
    fn zero_token_is_session_unavailable() {
        let chain = chain_with(FakeProvider::absent("primary").with_open(Ok(0)));
        assert!(matches!(
            SessionHandle::open(chain),
            Err(LicprobeError::SessionUnavailable)
        ));
    }

    #[test]
    fn open_failure_propagates_taxonomy() {
        let chain = chain_with(
            FakeProvider::absent("primary").with_open(Err(CallError::Failed(0xC004_D302))),
        );
        assert!(matches!(
            SessionHandle::open(chain),
            Err(LicprobeError::NativeCallFailed { code: 0xC004_D302, .. })
        ));
    }

    #[test]
    fn close_is_idempotent_and_released_once() {
        let primary = Arc::new(FakeProvider::absent("primary").with_open(Ok(0x40)).with_close());
        let chain = Arc::new(ProviderChain::new(
            primary.clone(),
            Arc::new(FakeProvider::absent("secondary")),
        ));
        let mut handle = SessionHandle::open(chain).unwrap();
        handle.close();
        handle.close();
        assert!(!handle.is_open());
        assert!(matches!(handle.token(), Err(LicprobeError::InvalidSession)));
        drop(handle);
        assert_eq!(primary.close_calls(), 1);
    }

    #[test]
    fn drop_closes_exactly_once() {
        let primary = Arc::new(FakeProvider::absent("primary").with_open(Ok(0x40)).with_close());
        let chain = Arc::new(ProviderChain::new(
            primary.clone(),
            Arc::new(FakeProvider::absent("secondary")),
        ));
        {
            let handle = SessionHandle::open(chain).unwrap();
            assert!(handle.is_open());
        }
        assert_eq!(primary.close_calls(), 1);
    }

    #[test]
    fn close_failure_is_swallowed() {
        let chain = chain_with(FakeProvider::absent("primary").with_open(Ok(0x40)));
        // No close entry point anywhere: the close is best-effort.
        let mut handle = SessionHandle::open(chain).unwrap();
        handle.close();
        assert!(!handle.is_open());
    }
}
