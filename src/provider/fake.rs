//! Configurable in-memory provider for tests.
//!
//! Every operation defaults to "entry point absent" so a bare fake behaves
//! like a machine without the module installed; builders opt individual
//! operations in. Close calls are counted so tests can assert the
//! exactly-once release contract.

use crate::buffer::RawBuffer;
use crate::provider::{CallError, CallResult, NativeProvider, ValueScope};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

type Scripted<T> = Option<Result<T, CallError>>;

fn run<T: Clone>(scripted: &Scripted<T>) -> CallResult<T> {
    match scripted {
        None => Err(CallError::Unavailable),
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(error)) => Err(*error),
    }
}

/// A provider whose responses are scripted per operation.
#[derive(Default)]
pub struct FakeProvider {
    name: &'static str,
    open: Scripted<usize>,
    close: Scripted<()>,
    identifiers: Scripted<Vec<Uuid>>,
    status: Scripted<(u32, Vec<u8>)>,
    value: Scripted<(u32, Vec<u8>)>,
    offline_id: Scripted<String>,
    windows_value: Scripted<(u32, Vec<u8>)>,
    windows_dword: Scripted<u32>,
    genuine: Scripted<u32>,
    close_calls: AtomicUsize,
}

impl FakeProvider {
    /// A provider with every entry point absent.
    pub fn absent(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Script the open operation.
    pub fn with_open(mut self, result: Result<usize, CallError>) -> Self {
        self.open = Some(result);
        self
    }

    /// Script the close operation to succeed.
    pub fn with_close(mut self) -> Self {
        self.close = Some(Ok(()));
        self
    }

    /// Script the identifier enumeration.
    pub fn with_identifiers(mut self, result: Result<Vec<Uuid>, CallError>) -> Self {
        self.identifiers = Some(result);
        self
    }

    /// Script the status query with a raw record buffer and count.
    pub fn with_status(mut self, result: Result<(u32, Vec<u8>), CallError>) -> Self {
        self.status = Some(result);
        self
    }

    /// Script the named-value query with a kind tag and raw payload.
    pub fn with_value(mut self, result: Result<(u32, Vec<u8>), CallError>) -> Self {
        self.value = Some(result);
        self
    }

    /// Script the derived-identifier operation.
    pub fn with_offline_id(mut self, result: Result<&str, CallError>) -> Self {
        self.offline_id = Some(result.map(str::to_string));
        self
    }

    /// Script the Windows-scoped value query.
    pub fn with_windows_value(mut self, result: Result<(u32, Vec<u8>), CallError>) -> Self {
        self.windows_value = Some(result);
        self
    }

    /// Script the Windows-scoped 32-bit query.
    pub fn with_windows_dword(mut self, result: Result<u32, CallError>) -> Self {
        self.windows_dword = Some(result);
        self
    }

    /// Script the genuineness check.
    pub fn with_genuine(mut self, result: Result<u32, CallError>) -> Self {
        self.genuine = Some(result);
        self
    }

    /// How many times close was invoked.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl NativeProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn open_session(&self) -> CallResult<usize> {
        run(&self.open)
    }

    fn close_session(&self, _token: usize) -> CallResult<()> {
        let result = run(&self.close);
        if !matches!(result, Err(CallError::Unavailable)) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    fn list_identifiers(&self, _token: usize, _app: &Uuid) -> CallResult<(u32, RawBuffer)> {
        let ids = run(&self.identifiers)?;
        let mut bytes = Vec::with_capacity(ids.len() * 16);
        for id in &ids {
            bytes.extend_from_slice(&id.to_bytes_le());
        }
        Ok((ids.len() as u32, RawBuffer::from_vec(bytes)))
    }

    fn get_status(
        &self,
        _token: usize,
        _app: &Uuid,
        _product: &Uuid,
    ) -> CallResult<(u32, RawBuffer)> {
        let (count, bytes) = run(&self.status)?;
        Ok((count, RawBuffer::from_vec(bytes)))
    }

    fn get_value(
        &self,
        _token: usize,
        _scope: &ValueScope,
        _name: &str,
    ) -> CallResult<(u32, RawBuffer)> {
        let (kind, bytes) = run(&self.value)?;
        Ok((kind, RawBuffer::from_vec(bytes)))
    }

    fn generate_offline_id(&self, _token: usize, _product: &Uuid) -> CallResult<String> {
        run(&self.offline_id)
    }

    fn windows_value(&self, _name: &str) -> CallResult<(u32, RawBuffer)> {
        let (kind, bytes) = run(&self.windows_value)?;
        Ok((kind, RawBuffer::from_vec(bytes)))
    }

    fn windows_dword(&self, _name: &str) -> CallResult<u32> {
        run(&self.windows_dword)
    }

    fn is_genuine_local(&self) -> CallResult<u32> {
        run(&self.genuine)
    }
}
