//! # Licprobe
//!
//! **Native Windows Software Licensing state queries for Rust.**
//!
//! Licprobe opens a session against the native licensing subsystem and
//! surfaces activation state: product instance identifiers, license status
//! records, named configuration values, offline installation identifiers,
//! genuineness, and subscription state.
//!
//! ## Features
//!
//! - **Dual-provider fallback** — the subsystem ships as two interchangeable
//!   native modules; every call tries the primary and falls back when the
//!   module or entry point is absent
//! - **Typed value decoding** — the tagged `(kind, length, buffer)` response
//!   shape shared by all named-value domains decodes to one enum
//! - **Status refinement** — raw status codes are remapped with their reason
//!   HRESULTs into the effective licensing state
//! - **Exact-once resource release** — sessions close once, provider-owned
//!   buffers free once, on every exit path
//!
//! ## Quickstart
//!
//! ```no_run
//! use licprobe::{LicensingManager, WINDOWS_APP_ID};
//!
//! fn main() -> Result<(), licprobe::LicprobeError> {
//!     let manager = LicensingManager::new()?;
//!     let session = manager.open_session()?;
//!
//!     for sku in session.list_identifiers(&WINDOWS_APP_ID)? {
//!         for record in session.status(&WINDOWS_APP_ID, &sku)? {
//!             println!("{sku}: {}", record.status);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Sessions and threading
//!
//! All calls are synchronous and block on the native subsystem. A session
//! supports at most one in-flight call at a time; open independent sessions
//! for concurrent work. There is no cancellation below the call boundary.
//!
//! ## Error model
//!
//! Failures come back as [`LicprobeError`]: an operation no provider
//! exports is `CapabilityNotPresent`, a provider that ran the call and
//! failed is `NativeCallFailed` with the HRESULT preserved, and use of a
//! closed session is `InvalidSession`. Unrecognized value shapes decode to
//! [`TypedValue::Absent`] rather than failing.

#![deny(warnings)]
#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/licprobe/0.1.0")]

// Core modules
pub mod buffer;
pub mod config;
pub mod errors;

// Decode layer
pub mod decode;

// Provider layer
pub mod dispatch;
pub mod provider;
pub mod subscription;

// Session ownership
pub mod session;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use buffer::RawBuffer;
pub use config::ProviderConfig;
pub use decode::records::{LicenseStatus, LicenseStatusRecord};
pub use decode::value::TypedValue;
pub use dispatch::ProviderChain;
pub use errors::LicprobeError;
pub use manager::{GenuineState, LicensingManager, LicensingSession};
pub use provider::{CallError, NativeProvider, ValueScope, OFFICE_APP_ID, WINDOWS_APP_ID};
pub use session::SessionHandle;
pub use subscription::{SubscriptionKind, SubscriptionState, SubscriptionStatus};

#[cfg(any(test, feature = "test-seams"))]
pub use provider::fake::FakeProvider;
#[cfg(any(test, feature = "test-seams"))]
pub use subscription::FakeSubscription;
