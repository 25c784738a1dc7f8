//! Dynamic binding of one native provider module.
//!
//! Entry points are resolved per call: a missing module or a missing export
//! reports [`CallError::Unavailable`] rather than an error, which is what
//! lets the dispatch layer fall back to the other provider. Result blocks
//! allocated by the provider are wrapped in [`RawBuffer`] with the platform
//! local-heap release routine, so they are freed exactly once by the caller
//! that decodes them.

use crate::buffer::{RawBuffer, ReleaseFn};
use crate::provider::{CallError, CallResult, NativeProvider, RawGuid, ValueScope, WINDOWS_APP_ID};
use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use std::ptr;
use uuid::Uuid;

// Identifier namespaces understood by the enumeration entry point.
const ID_KIND_APPLICATION: u32 = 0;
const ID_KIND_PRODUCT_SKU: u32 = 1;

type OpenFn = unsafe extern "system" fn(*mut *mut c_void) -> i32;
type CloseFn = unsafe extern "system" fn(*mut c_void) -> i32;
type ListIdsFn = unsafe extern "system" fn(
    *mut c_void,
    u32,
    *const RawGuid,
    u32,
    *mut u32,
    *mut *mut c_void,
) -> i32;
type StatusFn = unsafe extern "system" fn(
    *mut c_void,
    *const RawGuid,
    *const RawGuid,
    *const u16,
    *mut u32,
    *mut *mut c_void,
) -> i32;
type KeyedValueFn = unsafe extern "system" fn(
    *mut c_void,
    *const RawGuid,
    *const u16,
    *mut u32,
    *mut u32,
    *mut *mut u8,
) -> i32;
type ServiceValueFn =
    unsafe extern "system" fn(*mut c_void, *const u16, *mut u32, *mut u32, *mut *mut u8) -> i32;
type WindowsValueFn =
    unsafe extern "system" fn(*const u16, *mut u32, *mut u32, *mut *mut u8) -> i32;
type WindowsDwordFn = unsafe extern "system" fn(*const u16, *mut u32) -> i32;
type GenuineFn = unsafe extern "system" fn(*const RawGuid, *mut u32, *mut c_void) -> i32;
type OfflineIdFn = unsafe extern "system" fn(*mut c_void, *const RawGuid, *mut *mut u16) -> i32;

/// Lazily-loaded handle to one named native module.
///
/// The load is attempted once; a module that is not present on this machine
/// stays absent for the process lifetime.
pub(crate) struct ModuleBinding {
    name: &'static str,
    library: OnceCell<Option<Library>>,
}

impl ModuleBinding {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            library: OnceCell::new(),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    fn library(&self) -> Option<&Library> {
        self.library
            .get_or_init(|| {
                // Loading runs module initializers; the licensing modules
                // are plain system libraries.
                let loaded = unsafe { Library::new(self.name) };
                if loaded.is_err() {
                    tracing::debug!(module = self.name, "provider module not present");
                }
                loaded.ok()
            })
            .as_ref()
    }

    /// Resolve one export, reporting absence as `Unavailable`.
    pub(crate) fn symbol<T>(&self, export: &[u8]) -> CallResult<Symbol<'_, T>> {
        let library = self.library().ok_or(CallError::Unavailable)?;
        unsafe { library.get(export) }.map_err(|_| CallError::Unavailable)
    }
}

/// The platform local-heap free routine, resolved once.
///
/// The system module stays mapped for the process lifetime, so the resolved
/// pointer outlives the temporary library handle.
fn heap_release() -> Option<ReleaseFn> {
    static RELEASE: OnceCell<Option<ReleaseFn>> = OnceCell::new();

    fn resolve() -> Option<ReleaseFn> {
        unsafe {
            let library = Library::new("kernel32.dll").ok()?;
            let symbol = library.get::<ReleaseFn>(b"LocalFree\0").ok()?;
            let release = *symbol;
            std::mem::forget(library); // keep the module mapped
            Some(release)
        }
    }

    *RELEASE.get_or_init(resolve)
}

fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(hr: i32) -> CallResult<()> {
    if hr == 0 {
        Ok(())
    } else {
        Err(CallError::Failed(hr as u32))
    }
}

/// Wrap a provider-allocated block, or an empty buffer when the call
/// produced nothing.
unsafe fn take_buffer(ptr: *mut c_void, len: usize, release: ReleaseFn) -> RawBuffer {
    if ptr.is_null() {
        RawBuffer::from_vec(Vec::new())
    } else {
        RawBuffer::from_foreign(ptr, len, release)
    }
}

/// One dynamically-bound native licensing provider.
pub struct DynamicProvider {
    module: ModuleBinding,
}

impl DynamicProvider {
    /// Bind against the named module. The module is not loaded until the
    /// first call.
    pub fn new(module: &'static str) -> Self {
        Self {
            module: ModuleBinding::new(module),
        }
    }

    /// Resolve the release routine needed for an allocating call.
    ///
    /// Resolved before the call is made, so a resolution failure can never
    /// strand an allocation.
    fn release_routine(&self) -> CallResult<ReleaseFn> {
        heap_release().ok_or(CallError::Unavailable)
    }

    fn keyed_value(
        &self,
        export: &'static [u8],
        token: usize,
        key: &Uuid,
        name: &str,
    ) -> CallResult<(u32, RawBuffer)> {
        let release = self.release_routine()?;
        let call: Symbol<'_, KeyedValueFn> = self.module.symbol(export)?;
        let key = RawGuid::from(key);
        let name = to_wide(name);
        let mut kind = 0u32;
        let mut len = 0u32;
        let mut data: *mut u8 = ptr::null_mut();
        check(unsafe {
            call(
                token as *mut c_void,
                &key,
                name.as_ptr(),
                &mut kind,
                &mut len,
                &mut data,
            )
        })?;
        let buffer = unsafe { take_buffer(data as *mut c_void, len as usize, release) };
        Ok((kind, buffer))
    }
}

impl NativeProvider for DynamicProvider {
    fn name(&self) -> &'static str {
        self.module.name()
    }

    fn open_session(&self) -> CallResult<usize> {
        let open: Symbol<'_, OpenFn> = self.module.symbol(b"SLOpen\0")?;
        let mut handle: *mut c_void = ptr::null_mut();
        check(unsafe { open(&mut handle) })?;
        Ok(handle as usize)
    }

    fn close_session(&self, token: usize) -> CallResult<()> {
        let close: Symbol<'_, CloseFn> = self.module.symbol(b"SLClose\0")?;
        check(unsafe { close(token as *mut c_void) })
    }

    fn list_identifiers(&self, token: usize, app: &Uuid) -> CallResult<(u32, RawBuffer)> {
        let release = self.release_routine()?;
        let list: Symbol<'_, ListIdsFn> = self.module.symbol(b"SLGetSLIDList\0")?;
        let app = RawGuid::from(app);
        let mut count = 0u32;
        let mut ids: *mut c_void = ptr::null_mut();
        check(unsafe {
            list(
                token as *mut c_void,
                ID_KIND_APPLICATION,
                &app,
                ID_KIND_PRODUCT_SKU,
                &mut count,
                &mut ids,
            )
        })?;
        let len = count as usize * crate::decode::ident::IDENTIFIER_WIDTH;
        let buffer = unsafe { take_buffer(ids, len, release) };
        Ok((count, buffer))
    }

    fn get_status(&self, token: usize, app: &Uuid, product: &Uuid) -> CallResult<(u32, RawBuffer)> {
        let release = self.release_routine()?;
        let status: Symbol<'_, StatusFn> =
            self.module.symbol(b"SLGetLicensingStatusInformation\0")?;
        let app = RawGuid::from(app);
        let product = RawGuid::from(product);
        let mut count = 0u32;
        let mut records: *mut c_void = ptr::null_mut();
        check(unsafe {
            status(
                token as *mut c_void,
                &app,
                &product,
                ptr::null(),
                &mut count,
                &mut records,
            )
        })?;
        let len = count as usize * crate::decode::records::STATUS_RECORD_STRIDE;
        let buffer = unsafe { take_buffer(records, len, release) };
        Ok((count, buffer))
    }

    fn get_value(
        &self,
        token: usize,
        scope: &ValueScope,
        name: &str,
    ) -> CallResult<(u32, RawBuffer)> {
        match scope {
            ValueScope::ProductKey(key) => {
                self.keyed_value(b"SLGetPKeyInformation\0", token, key, name)
            }
            ValueScope::Sku(sku) => {
                self.keyed_value(b"SLGetProductSkuInformation\0", token, sku, name)
            }
            ValueScope::Application(app) => {
                self.keyed_value(b"SLGetApplicationInformation\0", token, app, name)
            }
            ValueScope::Service => {
                let release = self.release_routine()?;
                let call: Symbol<'_, ServiceValueFn> =
                    self.module.symbol(b"SLGetServiceInformation\0")?;
                let name = to_wide(name);
                let mut kind = 0u32;
                let mut len = 0u32;
                let mut data: *mut u8 = ptr::null_mut();
                check(unsafe {
                    call(
                        token as *mut c_void,
                        name.as_ptr(),
                        &mut kind,
                        &mut len,
                        &mut data,
                    )
                })?;
                let buffer = unsafe { take_buffer(data as *mut c_void, len as usize, release) };
                Ok((kind, buffer))
            }
        }
    }

    fn generate_offline_id(&self, token: usize, product: &Uuid) -> CallResult<String> {
        let derive: Symbol<'_, OfflineIdFn> =
            self.module.symbol(b"SLGenerateOfflineInstallationId\0")?;
        let product = RawGuid::from(product);
        let mut text: *mut u16 = ptr::null_mut();
        check(unsafe { derive(token as *mut c_void, &product, &mut text) })?;
        if text.is_null() {
            return Ok(String::new());
        }
        // Ownership exception: this string stays provider-owned. Every
        // other result block is released by the caller; this one must NOT
        // be freed, so it is copied out and the pointer dropped.
        let copied = unsafe {
            let mut len = 0usize;
            while *text.add(len) != 0 {
                len += 1;
            }
            String::from_utf16_lossy(std::slice::from_raw_parts(text, len))
        };
        Ok(copied)
    }

    fn windows_value(&self, name: &str) -> CallResult<(u32, RawBuffer)> {
        let release = self.release_routine()?;
        let call: Symbol<'_, WindowsValueFn> = self.module.symbol(b"SLGetWindowsInformation\0")?;
        let name = to_wide(name);
        let mut kind = 0u32;
        let mut len = 0u32;
        let mut data: *mut u8 = ptr::null_mut();
        check(unsafe { call(name.as_ptr(), &mut kind, &mut len, &mut data) })?;
        let buffer = unsafe { take_buffer(data as *mut c_void, len as usize, release) };
        Ok((kind, buffer))
    }

    fn windows_dword(&self, name: &str) -> CallResult<u32> {
        let call: Symbol<'_, WindowsDwordFn> =
            self.module.symbol(b"SLGetWindowsInformationDWORD\0")?;
        let name = to_wide(name);
        let mut value = 0u32;
        check(unsafe { call(name.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn is_genuine_local(&self) -> CallResult<u32> {
        let call: Symbol<'_, GenuineFn> = self.module.symbol(b"SLIsGenuineLocal\0")?;
        // The export only accepts the Windows application namespace.
        let app = RawGuid::from(&WINDOWS_APP_ID);
        let mut state = 0u32;
        check(unsafe { call(&app, &mut state, ptr::null_mut()) })?;
        Ok(state)
    }
}
