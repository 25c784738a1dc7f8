//! Native licensing provider contract.
//!
//! Two interchangeable provider modules expose the same logical operation
//! set; a given machine or build may lack either module, or individual
//! entry points within one. The trait keeps that absence a first-class
//! result so dispatch can fall back without treating it as a failure.

pub mod native;

#[cfg(any(test, feature = "test-seams"))]
pub mod fake;

use crate::buffer::RawBuffer;
use uuid::Uuid;

/// Application namespace id for Windows product instances
/// (`55c92734-d682-4d71-983e-d6ec3f16059f`).
pub const WINDOWS_APP_ID: Uuid = Uuid::from_u128(0x55c92734_d682_4d71_983e_d6ec3f16059f);

/// Application namespace id for Office product instances
/// (`0ff1ce15-a989-479d-af46-f275c6370663`).
pub const OFFICE_APP_ID: Uuid = Uuid::from_u128(0x0ff1ce15_a989_479d_af46_f275c6370663);

/// Why a provider attempt did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// The provider module, or the specific entry point, is not present.
    Unavailable,
    /// The provider executed the call and returned a nonzero HRESULT.
    Failed(u32),
}

/// Result of one provider attempt.
pub type CallResult<T> = Result<T, CallError>;

/// Named-value domain addressed by a value query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueScope {
    /// Per-product-key values, keyed by the product key id.
    ProductKey(Uuid),
    /// Per-SKU values, keyed by the SKU id.
    Sku(Uuid),
    /// Per-service values; the service has no key.
    Service,
    /// Per-application values, keyed by the application namespace id.
    Application(Uuid),
}

/// One native licensing backend.
///
/// Buffer-producing operations return ownership of the raw result block to
/// the caller; the provider never frees what it hands out. The one
/// exception is the derived-identifier string, which stays provider-owned
/// and is therefore returned as a copied `String`.
pub trait NativeProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Open a licensing session, returning the opaque token.
    fn open_session(&self) -> CallResult<usize>;

    /// Close a licensing session.
    fn close_session(&self, token: usize) -> CallResult<()>;

    /// Enumerate product instance identifiers under an application
    /// namespace. Returns the element count and the raw identifier array.
    fn list_identifiers(&self, token: usize, app: &Uuid) -> CallResult<(u32, RawBuffer)>;

    /// Fetch license status records for a product. Returns the record count
    /// and the raw fixed-stride array.
    fn get_status(&self, token: usize, app: &Uuid, product: &Uuid) -> CallResult<(u32, RawBuffer)>;

    /// Fetch a named value from one of the per-key/per-SKU/per-service/
    /// per-application domains. Returns the kind tag and the raw payload.
    fn get_value(&self, token: usize, scope: &ValueScope, name: &str)
        -> CallResult<(u32, RawBuffer)>;

    /// Derive the offline installation identifier for a product instance.
    fn generate_offline_id(&self, token: usize, product: &Uuid) -> CallResult<String>;

    /// Fetch a Windows-scoped named value (no session). Secondary backend
    /// only.
    fn windows_value(&self, name: &str) -> CallResult<(u32, RawBuffer)>;

    /// Fetch a Windows-scoped 32-bit value (no session). Secondary backend
    /// only.
    fn windows_dword(&self, name: &str) -> CallResult<u32>;

    /// Local genuineness flag. Secondary backend only.
    fn is_genuine_local(&self) -> CallResult<u32>;
}

/// GUID in the native little-endian wire layout, for passing by pointer.
#[repr(transparent)]
pub(crate) struct RawGuid([u8; 16]);

impl From<&Uuid> for RawGuid {
    fn from(id: &Uuid) -> Self {
        Self(id.to_bytes_le())
    }
}
