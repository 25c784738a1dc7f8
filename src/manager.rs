//! Licensing Manager - the main public API for licprobe.
//!
//! The `LicensingManager` wires the provider chain and the subscription
//! backend together and hands out scoped sessions:
//! - Session queries: identifiers, status records, named values, derived id
//! - Session-less queries: Windows-scoped values, genuineness, subscription
//!
//! Every query validates the session, delegates to the chain, decodes the
//! raw result, and lets the native buffer release in the same scope.

use crate::config::ProviderConfig;
use crate::decode::ident::parse_identifiers;
use crate::decode::records::{parse_status_records, LicenseStatusRecord};
use crate::decode::value::{decode_value, TypedValue};
use crate::dispatch::ProviderChain;
use crate::errors::LicprobeError;
use crate::provider::{CallError, ValueScope};
use crate::session::SessionHandle;
use crate::subscription::{ClipProvider, SubscriptionProvider, SubscriptionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Local genuineness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenuineState {
    /// The installation is genuine.
    Genuine,
    /// The license is invalid.
    InvalidLicense,
    /// The installation has been tampered with.
    Tampered,
    /// Genuineness could not be determined offline.
    Offline,
    /// A state code outside the known set, passed through unchanged.
    Unknown(u32),
}

impl GenuineState {
    /// Map the raw 32-bit genuineness flag to its variant.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => GenuineState::Genuine,
            1 => GenuineState::InvalidLicense,
            2 => GenuineState::Tampered,
            3 => GenuineState::Offline,
            other => GenuineState::Unknown(other),
        }
    }
}

/// Main entry point for licensing queries.
///
/// Create one instance per application and open sessions from it as needed.
/// Manager-level queries need no session; they route to the secondary
/// provider or the subscription backend directly.
pub struct LicensingManager {
    chain: Arc<ProviderChain>,
    subscription: Arc<dyn SubscriptionProvider>,
}

impl LicensingManager {
    /// Create a manager bound to the production provider modules.
    pub fn new() -> Result<Self, LicprobeError> {
        Self::with_config(ProviderConfig::default())
    }

    /// Create a manager with explicit provider module names.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn with_config(config: ProviderConfig) -> Result<Self, LicprobeError> {
        config.validate()?;
        Ok(Self {
            chain: Arc::new(ProviderChain::from_config(&config)),
            subscription: Arc::new(ClipProvider::new(config.subscription_module)),
        })
    }

    /// Create a manager over injected backends (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_providers(
        chain: ProviderChain,
        subscription: Arc<dyn SubscriptionProvider>,
    ) -> Self {
        Self {
            chain: Arc::new(chain),
            subscription,
        }
    }

    /// Open a licensing session.
    ///
    /// # Errors
    /// - `CapabilityNotPresent` - no provider exports the open operation
    /// - `NativeCallFailed` - a provider failed the open call
    /// - `SessionUnavailable` - the open call produced a null token
    pub fn open_session(&self) -> Result<LicensingSession, LicprobeError> {
        Ok(LicensingSession {
            handle: SessionHandle::open(self.chain.clone())?,
            chain: self.chain.clone(),
        })
    }

    /// Fetch a Windows-scoped named value.
    pub fn windows_value(&self, name: &str) -> Result<TypedValue, LicprobeError> {
        let (kind, buffer) = self.chain.windows_value(name)?;
        Ok(decode_value(kind, buffer.as_slice()))
    }

    /// Fetch a Windows-scoped 32-bit value.
    pub fn windows_dword(&self, name: &str) -> Result<u32, LicprobeError> {
        self.chain.windows_dword(name)
    }

    /// Check local genuineness.
    pub fn is_genuine_local(&self) -> Result<GenuineState, LicprobeError> {
        let state = self.chain.is_genuine_local()?;
        Ok(GenuineState::from_code(state))
    }

    /// Fetch the subscription status from the third backend.
    pub fn subscription_status(&self) -> Result<SubscriptionStatus, LicprobeError> {
        match self.subscription.subscription_status() {
            Ok(status) => Ok(status),
            Err(CallError::Unavailable) => Err(LicprobeError::CapabilityNotPresent {
                operation: "get-subscription-status",
            }),
            Err(CallError::Failed(code)) => Err(LicprobeError::NativeCallFailed {
                operation: "get-subscription-status",
                code,
            }),
        }
    }
}

/// One open licensing session and the queries scoped to it.
///
/// The session closes when dropped, or earlier via
/// [`close`](LicensingSession::close). Queries after close fail with
/// `InvalidSession`. The session performs no internal locking; keep at most
/// one call in flight at a time.
pub struct LicensingSession {
    handle: SessionHandle,
    chain: Arc<ProviderChain>,
}

impl LicensingSession {
    /// Whether the session has not yet been closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Enumerate product instance identifiers under an application
    /// namespace. An application with no instances yields an empty vec.
    pub fn list_identifiers(&self, app: &Uuid) -> Result<Vec<Uuid>, LicprobeError> {
        let token = self.handle.token()?;
        let (count, buffer) = self.chain.list_identifiers(token, app)?;
        let ids = parse_identifiers(buffer.as_slice(), count as usize);
        tracing::debug!(app = %app, count = ids.len(), "enumerated identifiers");
        Ok(ids)
    }

    /// Fetch decoded status records for a product.
    pub fn status(
        &self,
        app: &Uuid,
        product: &Uuid,
    ) -> Result<Vec<LicenseStatusRecord>, LicprobeError> {
        let token = self.handle.token()?;
        let (count, buffer) = self.chain.get_status(token, app, product)?;
        Ok(parse_status_records(buffer.as_slice(), count as usize))
    }

    /// Fetch a named value from one of the named-value domains.
    pub fn value(&self, scope: &ValueScope, name: &str) -> Result<TypedValue, LicprobeError> {
        let token = self.handle.token()?;
        let (kind, buffer) = self.chain.get_value(token, scope, name)?;
        Ok(decode_value(kind, buffer.as_slice()))
    }

    /// Derive the offline installation identifier for a product instance.
    pub fn generate_offline_id(&self, product: &Uuid) -> Result<String, LicprobeError> {
        let token = self.handle.token()?;
        self.chain.generate_offline_id(token, product)
    }

    /// Close the session. Idempotent; failures are swallowed.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::records::LicenseStatus;
    use crate::provider::fake::FakeProvider;
    use crate::provider::{OFFICE_APP_ID, WINDOWS_APP_ID};
    use crate::subscription::{FakeSubscription, SubscriptionKind, SubscriptionState};

    fn manager_with(primary: Arc<FakeProvider>, secondary: Arc<FakeProvider>) -> LicensingManager {
        LicensingManager::with_providers(
            ProviderChain::new(primary, secondary),
            Arc::new(FakeSubscription(Err(CallError::Unavailable))),
        )
    }

    fn open_ready() -> Arc<FakeProvider> {
        Arc::new(FakeProvider::absent("primary").with_open(Ok(0x40)).with_close())
    }

    #[test]
    fn empty_enumeration_is_success_and_session_stays_open() {
        let primary = Arc::new(
            FakeProvider::absent("primary")
                .with_open(Ok(0x40))
                .with_close()
                .with_identifiers(Ok(Vec::new())),
        );
        let manager = manager_with(primary, Arc::new(FakeProvider::absent("secondary")));
        let session = manager.open_session().unwrap();
        let ids = session.list_identifiers(&OFFICE_APP_ID).unwrap();
        assert!(ids.is_empty());
        assert!(session.is_open());
    }

    #[test]
    fn identifiers_decode_through_the_facade() {
        let sku = Uuid::from_u128(0x1234);
        let primary = Arc::new(
            FakeProvider::absent("primary")
                .with_open(Ok(0x40))
                .with_close()
                .with_identifiers(Ok(vec![sku])),
        );
        let manager = manager_with(primary, Arc::new(FakeProvider::absent("secondary")));
        let session = manager.open_session().unwrap();
        assert_eq!(session.list_identifiers(&WINDOWS_APP_ID).unwrap(), vec![sku]);
    }

    #[test]
    fn queries_after_close_are_invalid_session() {
        let manager = manager_with(open_ready(), Arc::new(FakeProvider::absent("secondary")));
        let mut session = manager.open_session().unwrap();
        session.close();
        assert!(!session.is_open());
        assert!(matches!(
            session.list_identifiers(&WINDOWS_APP_ID),
            Err(LicprobeError::InvalidSession)
        ));
        assert!(matches!(
            session.generate_offline_id(&Uuid::from_u128(1)),
            Err(LicprobeError::InvalidSession)
        ));
    }

    #[test]
    fn session_opens_via_fallback_when_primary_absent() {
        let secondary = Arc::new(
            FakeProvider::absent("secondary")
                .with_open(Ok(0x50))
                .with_close()
                .with_offline_id(Ok("123456-789012")),
        );
        let manager = manager_with(Arc::new(FakeProvider::absent("primary")), secondary);
        let session = manager.open_session().unwrap();
        assert_eq!(
            session.generate_offline_id(&Uuid::from_u128(1)).unwrap(),
            "123456-789012"
        );
    }

    #[test]
    fn status_records_decode_and_remap() {
        let mut record = vec![0u8; 40];
        record[16..20].copy_from_slice(&2u32.to_le_bytes()); // raw grace
        record[28..32].copy_from_slice(&0x4004_F00Du32.to_le_bytes());
        let primary = Arc::new(
            FakeProvider::absent("primary")
                .with_open(Ok(0x40))
                .with_close()
                .with_status(Ok((1, record))),
        );
        let manager = manager_with(primary, Arc::new(FakeProvider::absent("secondary")));
        let session = manager.open_session().unwrap();
        let records = session
            .status(&WINDOWS_APP_ID, &Uuid::from_u128(7))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, LicenseStatus::AdditionalGrace);
    }

    #[test]
    fn named_value_decodes_through_codec() {
        let payload: Vec<u8> = "RETAIL".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let primary = Arc::new(
            FakeProvider::absent("primary")
                .with_open(Ok(0x40))
                .with_close()
                .with_value(Ok((1, payload))),
        );
        let manager = manager_with(primary, Arc::new(FakeProvider::absent("secondary")));
        let session = manager.open_session().unwrap();
        let value = session
            .value(&ValueScope::Sku(Uuid::from_u128(7)), "Channel")
            .unwrap();
        assert_eq!(value.as_text(), Some("RETAIL"));
    }

    #[test]
    fn missing_value_capability_is_distinct_from_failure() {
        let manager = manager_with(open_ready(), Arc::new(FakeProvider::absent("secondary")));
        let session = manager.open_session().unwrap();
        assert!(matches!(
            session.value(&ValueScope::Service, "Version"),
            Err(LicprobeError::CapabilityNotPresent {
                operation: "get-named-value"
            })
        ));
    }

    #[test]
    fn windows_queries_route_to_secondary() {
        let secondary = Arc::new(
            FakeProvider::absent("secondary")
                .with_windows_dword(Ok(1))
                .with_windows_value(Ok((4, vec![5, 0, 0, 0]))),
        );
        let manager = manager_with(Arc::new(FakeProvider::absent("primary")), secondary);
        assert_eq!(manager.windows_dword("Security-SPP-IsKmsClient").unwrap(), 1);
        assert_eq!(
            manager.windows_value("Security-SPP-NotificationReason").unwrap(),
            TypedValue::Dword(5)
        );
    }

    #[test]
    fn genuine_state_maps_known_codes() {
        let secondary = Arc::new(FakeProvider::absent("secondary").with_genuine(Ok(2)));
        let manager = manager_with(Arc::new(FakeProvider::absent("primary")), secondary);
        assert_eq!(manager.is_genuine_local().unwrap(), GenuineState::Tampered);
        assert_eq!(GenuineState::from_code(0), GenuineState::Genuine);
        assert_eq!(GenuineState::from_code(9), GenuineState::Unknown(9));
    }

    #[test]
    fn subscription_status_maps_call_errors() {
        let manager = LicensingManager::with_providers(
            ProviderChain::new(
                Arc::new(FakeProvider::absent("primary")),
                Arc::new(FakeProvider::absent("secondary")),
            ),
            Arc::new(FakeSubscription(Err(CallError::Failed(0x8007_0002)))),
        );
        assert!(matches!(
            manager.subscription_status(),
            Err(LicprobeError::NativeCallFailed {
                operation: "get-subscription-status",
                code: 0x8007_0002
            })
        ));
    }

    #[test]
    fn subscription_status_decodes() {
        let status = SubscriptionStatus {
            enabled: true,
            sku_id: 3,
            state: SubscriptionState::Active,
            kind: SubscriptionKind::Device,
            expiration: 0,
        };
        let manager = LicensingManager::with_providers(
            ProviderChain::new(
                Arc::new(FakeProvider::absent("primary")),
                Arc::new(FakeProvider::absent("secondary")),
            ),
            Arc::new(FakeSubscription(Ok(status.clone()))),
        );
        assert_eq!(manager.subscription_status().unwrap(), status);
    }

    #[test]
    fn config_validation_runs_on_construction() {
        let config = ProviderConfig {
            primary_module: "",
            ..ProviderConfig::default()
        };
        assert!(matches!(
            LicensingManager::with_config(config),
            Err(LicprobeError::ConfigError(_))
        ));
    }

    #[test]
    fn independent_sessions_have_independent_lifetimes() {
        let manager = manager_with(open_ready(), Arc::new(FakeProvider::absent("secondary")));
        let mut first = manager.open_session().unwrap();
        let second = manager.open_session().unwrap();
        first.close();
        assert!(!first.is_open());
        assert!(second.is_open());
    }
}
