//! Subscription state probe.
//!
//! A third native backend, unrelated to the two licensing providers,
//! exposes a single call that fills a small fixed struct. The struct memory
//! is allocated by the caller before the call and freed by the caller after
//! it; the backend only writes into it.

use crate::decode::filetime_to_utc;
use crate::provider::native::ModuleBinding;
use crate::provider::{CallError, CallResult};
use chrono::{DateTime, Utc};
use libloading::Symbol;
use serde::{Deserialize, Serialize};

/// Raw out-struct filled by the subscription call.
///
/// Fixed 24-byte layout, a versioned platform contract like the status
/// record stride.
#[repr(C)]
#[derive(Default)]
struct RawSubscriptionStatus {
    enabled: u32,
    sku_id: u32,
    state: u32,
    kind: u32,
    expiration: u64,
}

type SubscriptionStatusFn = unsafe extern "system" fn(*mut RawSubscriptionStatus) -> i32;

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    /// No subscription is in effect.
    Inactive,
    /// An active subscription applies.
    Active,
    /// A state code outside the known set, passed through unchanged.
    Unknown(u32),
}

impl SubscriptionState {
    fn from_code(code: u32) -> Self {
        match code {
            0 => SubscriptionState::Inactive,
            1 => SubscriptionState::Active,
            other => SubscriptionState::Unknown(other),
        }
    }
}

/// Kind of subscription binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionKind {
    /// No subscription type reported.
    None,
    /// Subscription bound to the device.
    Device,
    /// Subscription bound to the user.
    User,
    /// A type code outside the known set, passed through unchanged.
    Unknown(u32),
}

impl SubscriptionKind {
    fn from_code(code: u32) -> Self {
        match code {
            0 => SubscriptionKind::None,
            1 => SubscriptionKind::Device,
            2 => SubscriptionKind::User,
            other => SubscriptionKind::Unknown(other),
        }
    }
}

/// Decoded subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Whether subscription licensing is enabled on this machine.
    pub enabled: bool,
    /// SKU id of the subscription product.
    pub sku_id: u32,
    /// Lifecycle state.
    pub state: SubscriptionState,
    /// Subscription binding type.
    pub kind: SubscriptionKind,
    /// Expiration as a FILETIME tick count; zero when none applies.
    pub expiration: u64,
}

impl SubscriptionStatus {
    /// The expiration as a UTC timestamp, when one is set.
    pub fn expiration_utc(&self) -> Option<DateTime<Utc>> {
        filetime_to_utc(self.expiration)
    }

    fn from_raw(raw: &RawSubscriptionStatus) -> Self {
        Self {
            enabled: raw.enabled != 0,
            sku_id: raw.sku_id,
            state: SubscriptionState::from_code(raw.state),
            kind: SubscriptionKind::from_code(raw.kind),
            expiration: raw.expiration,
        }
    }
}

/// Backend capable of reporting subscription status.
pub trait SubscriptionProvider: Send + Sync {
    /// Fetch the current subscription status.
    fn subscription_status(&self) -> CallResult<SubscriptionStatus>;
}

/// Dynamically-bound subscription backend.
pub struct ClipProvider {
    module: ModuleBinding,
}

impl ClipProvider {
    /// Bind against the named module. Not loaded until the first call.
    pub fn new(module: &'static str) -> Self {
        Self {
            module: ModuleBinding::new(module),
        }
    }
}

impl SubscriptionProvider for ClipProvider {
    fn subscription_status(&self) -> CallResult<SubscriptionStatus> {
        let call: Symbol<'_, SubscriptionStatusFn> =
            self.module.symbol(b"ClipGetSubscriptionStatus\0")?;
        // Caller-allocated out-struct; freed when the box drops.
        let mut raw = Box::new(RawSubscriptionStatus::default());
        let hr = unsafe { call(raw.as_mut()) };
        if hr != 0 {
            return Err(CallError::Failed(hr as u32));
        }
        Ok(SubscriptionStatus::from_raw(&raw))
    }
}

/// Scripted subscription backend for tests.
#[cfg(any(test, feature = "test-seams"))]
pub struct FakeSubscription(
    /// The scripted response; `Unavailable` models a missing module.
    pub CallResult<SubscriptionStatus>,
);

#[cfg(any(test, feature = "test-seams"))]
impl SubscriptionProvider for FakeSubscription {
    fn subscription_status(&self) -> CallResult<SubscriptionStatus> {
        self.0.clone()
    }
}
