//! Ordered two-provider dispatch.
//!
//! Each logical operation is attempted against the primary provider and,
//! when the module or entry point is absent there, re-attempted against the
//! secondary. The order is fixed and never influenced by earlier outcomes.
//! A provider that is present but returns a failure code stops the chain:
//! that is a real answer, not a routing miss. A handful of operations exist
//! only on the secondary provider and never touch the primary.

use crate::buffer::RawBuffer;
use crate::config::ProviderConfig;
use crate::errors::LicprobeError;
use crate::provider::native::DynamicProvider;
use crate::provider::{CallError, CallResult, NativeProvider, ValueScope};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed-order chain over the two interchangeable providers.
pub struct ProviderChain {
    primary: Arc<dyn NativeProvider>,
    secondary: Arc<dyn NativeProvider>,
}

impl ProviderChain {
    /// Build a chain over two providers, attempted in the given order.
    pub fn new(primary: Arc<dyn NativeProvider>, secondary: Arc<dyn NativeProvider>) -> Self {
        Self { primary, secondary }
    }

    /// Build the production chain from configured module names.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            Arc::new(DynamicProvider::new(config.primary_module)),
            Arc::new(DynamicProvider::new(config.secondary_module)),
        )
    }

    /// Attempt an operation on the primary, then the secondary.
    fn attempt<T>(
        &self,
        operation: &'static str,
        call: impl Fn(&dyn NativeProvider) -> CallResult<T>,
    ) -> Result<T, LicprobeError> {
        for provider in [&self.primary, &self.secondary] {
            match call(provider.as_ref()) {
                Ok(value) => return Ok(value),
                Err(CallError::Unavailable) => {
                    tracing::debug!(
                        provider = provider.name(),
                        operation,
                        "operation not exported, trying next provider"
                    );
                }
                Err(CallError::Failed(code)) => {
                    return Err(LicprobeError::NativeCallFailed { operation, code })
                }
            }
        }
        Err(LicprobeError::CapabilityNotPresent { operation })
    }

    /// Attempt an operation defined only on the secondary provider.
    fn secondary_only<T>(
        &self,
        operation: &'static str,
        call: impl Fn(&dyn NativeProvider) -> CallResult<T>,
    ) -> Result<T, LicprobeError> {
        match call(self.secondary.as_ref()) {
            Ok(value) => Ok(value),
            Err(CallError::Unavailable) => Err(LicprobeError::CapabilityNotPresent { operation }),
            Err(CallError::Failed(code)) => Err(LicprobeError::NativeCallFailed { operation, code }),
        }
    }

    /// Open a licensing session.
    pub fn open_session(&self) -> Result<usize, LicprobeError> {
        self.attempt("open-session", |provider| provider.open_session())
    }

    /// Close a licensing session.
    pub fn close_session(&self, token: usize) -> Result<(), LicprobeError> {
        self.attempt("close-session", |provider| provider.close_session(token))
    }

    /// Enumerate identifiers under an application namespace. The returned
    /// buffer is owned by the caller.
    pub fn list_identifiers(
        &self,
        token: usize,
        app: &Uuid,
    ) -> Result<(u32, RawBuffer), LicprobeError> {
        self.attempt("list-identifiers", |provider| {
            provider.list_identifiers(token, app)
        })
    }

    /// Fetch raw status records for a product. The returned buffer is owned
    /// by the caller.
    pub fn get_status(
        &self,
        token: usize,
        app: &Uuid,
        product: &Uuid,
    ) -> Result<(u32, RawBuffer), LicprobeError> {
        self.attempt("get-status", |provider| {
            provider.get_status(token, app, product)
        })
    }

    /// Fetch a raw named value. The returned buffer is owned by the caller.
    pub fn get_value(
        &self,
        token: usize,
        scope: &ValueScope,
        name: &str,
    ) -> Result<(u32, RawBuffer), LicprobeError> {
        self.attempt("get-named-value", |provider| {
            provider.get_value(token, scope, name)
        })
    }

    /// Derive the offline installation identifier for a product instance.
    pub fn generate_offline_id(
        &self,
        token: usize,
        product: &Uuid,
    ) -> Result<String, LicprobeError> {
        self.attempt("generate-derived-identifier", |provider| {
            provider.generate_offline_id(token, product)
        })
    }

    /// Fetch a Windows-scoped named value. Secondary provider only.
    pub fn windows_value(&self, name: &str) -> Result<(u32, RawBuffer), LicprobeError> {
        self.secondary_only("get-windows-scoped-value", |provider| {
            provider.windows_value(name)
        })
    }

    /// Fetch a Windows-scoped 32-bit value. Secondary provider only.
    pub fn windows_dword(&self, name: &str) -> Result<u32, LicprobeError> {
        self.secondary_only("get-windows-scoped-dword", |provider| {
            provider.windows_dword(name)
        })
    }

    /// Local genuineness flag. Secondary provider only.
    pub fn is_genuine_local(&self) -> Result<u32, LicprobeError> {
        self.secondary_only("is-genuine-local", |provider| provider.is_genuine_local())
    }
}
