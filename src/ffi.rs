//! C ABI exposed to the pipeline host.
//!
//! The host loads the library, resolves the `torustiq_module_*` symbols,
//! calls [`torustiq_module_get_info`] and [`torustiq_module_init`], then
//! drives each step through configure, set_param, start, process_record and
//! shutdown. Every call is routed to one process-wide [`Connector`].
//!
//! Strings and records allocated here are handed to the host and must be
//! released exactly once with [`torustiq_module_free_char_ptr`] and
//! [`torustiq_module_free_record`]. Records passed in by the host are only
//! read for the duration of the call.

use crate::error::ConfigureError;
use crate::logging;
use crate::record::{MetadataEntry, Record};
use crate::step::{
    self, Connector, DataReceivedHandler, ModuleHandle, StepConfig, StepKind, TerminationHandler,
};
use std::ffi::{c_char, c_uint, CStr, CString};
use std::ptr;
use std::sync::{Arc, OnceLock};
use tracing::debug;

const MODULE_ID: &CStr = c"kafka";
const MODULE_NAME: &CStr = c"Kafka destination";

static CONNECTOR: OnceLock<Connector> = OnceLock::new();

fn connector() -> &'static Connector {
    CONNECTOR.get_or_init(Connector::default)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStepKind {
    Source,
    Transformation,
    Destination,
}

impl From<PipelineStepKind> for StepKind {
    fn from(kind: PipelineStepKind) -> Self {
        match kind {
            PipelineStepKind::Source => StepKind::Source,
            PipelineStepKind::Transformation => StepKind::Transformation,
            PipelineStepKind::Destination => StepKind::Destination,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Step,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LibInfo {
    pub api_version: c_uint,
    pub id: *const c_char,
    pub kind: ModuleKind,
    pub name: *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct ByteBuffer {
    pub bytes: *mut u8,
    pub len: usize,
}

impl ByteBuffer {
    fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        Self {
            bytes: Box::into_raw(boxed) as *mut u8,
            len,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct RecordMetadata {
    pub name: *const c_char,
    pub value: *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct Array<T> {
    pub data: *mut T,
    pub len: c_uint,
}

/// A record crossing the boundary: payload plus metadata pairs.
#[repr(C)]
#[derive(Debug)]
pub struct FfiRecord {
    pub content: ByteBuffer,
    pub metadata: Array<RecordMetadata>,
}

impl FfiRecord {
    /// Moves a record into connector-allocated C memory. Release it with
    /// [`torustiq_module_free_record`].
    pub fn from_record(record: Record) -> Self {
        let entries: Box<[RecordMetadata]> = record
            .metadata
            .into_iter()
            .map(|entry| RecordMetadata {
                name: into_c_string(entry.name),
                value: into_c_string(entry.value),
            })
            .collect();
        let len = entries.len() as c_uint;

        Self {
            content: ByteBuffer::from_vec(record.payload),
            metadata: Array {
                data: Box::into_raw(entries) as *mut RecordMetadata,
                len,
            },
        }
    }

    /// Copies the record into owned Rust values. Metadata pairs with a null
    /// name or value are skipped.
    ///
    /// # Safety
    ///
    /// `content.bytes` must point to `content.len` readable bytes and
    /// `metadata.data` to `metadata.len` entries whose non-null strings are
    /// NUL-terminated, or the pointers must be null.
    pub unsafe fn to_record(&self) -> Record {
        let payload = if self.content.bytes.is_null() || self.content.len == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts(self.content.bytes, self.content.len).to_vec()
        };

        let metadata = if self.metadata.data.is_null() || self.metadata.len == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts(self.metadata.data, self.metadata.len as usize)
                .iter()
                .filter_map(|pair| {
                    Some(MetadataEntry::new(
                        c_str_to_string(pair.name)?,
                        c_str_to_string(pair.value)?,
                    ))
                })
                .collect()
        };

        Record { payload, metadata }
    }
}

pub type TerminationCallbackFn = extern "C" fn(ModuleHandle);
pub type DataReceivedCallbackFn = extern "C" fn(FfiRecord, ModuleHandle);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ConfigureArgs {
    pub kind: PipelineStepKind,
    pub step_handle: ModuleHandle,
    pub on_step_terminate_cb: Option<TerminationCallbackFn>,
    pub on_data_received_fn: Option<DataReceivedCallbackFn>,
}

impl From<ConfigureArgs> for StepConfig {
    fn from(args: ConfigureArgs) -> Self {
        let mut config = StepConfig::new(args.kind.into(), args.step_handle);
        config.on_terminate = args.on_step_terminate_cb.map(|cb| {
            let handler: TerminationHandler = Arc::new(move |h| cb(h));
            handler
        });
        config.on_data_received = args.on_data_received_fn.map(|cb| {
            let handler: DataReceivedHandler =
                Arc::new(move |record, h| cb(FfiRecord::from_record(record), h));
            handler
        });
        config
    }
}

#[repr(C)]
#[derive(Debug)]
pub enum ConfigureFnResult {
    Ok,
    ErrorKindNotSupported,
    ErrorMultipleStepsNotSupported(ModuleHandle),
    ErrorMisc(*const c_char),
}

impl From<Result<(), ConfigureError>> for ConfigureFnResult {
    fn from(result: Result<(), ConfigureError>) -> Self {
        match result {
            Ok(()) => ConfigureFnResult::Ok,
            Err(ConfigureError::KindNotSupported) => ConfigureFnResult::ErrorKindNotSupported,
            Err(ConfigureError::MultipleStepsNotSupported(h)) => {
                ConfigureFnResult::ErrorMultipleStepsNotSupported(h)
            }
            Err(ConfigureError::Misc(msg)) => ConfigureFnResult::ErrorMisc(into_c_string(msg)),
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub enum StartFnResult {
    Ok,
    ErrorMisc(*const c_char),
}

#[repr(C)]
#[derive(Debug)]
pub enum ProcessRecordFnResult {
    Ok,
    Err(*const c_char),
}

/// Hands a string to the host. Interior NUL bytes are dropped.
fn into_c_string(message: String) -> *const c_char {
    CString::new(message.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
        .cast_const()
}

unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

#[no_mangle]
pub extern "C" fn torustiq_module_get_info() -> LibInfo {
    let info = step::module_info();
    LibInfo {
        api_version: info.api_version,
        id: MODULE_ID.as_ptr(),
        kind: ModuleKind::Step,
        name: MODULE_NAME.as_ptr(),
    }
}

#[no_mangle]
pub extern "C" fn torustiq_module_init() {
    logging::init(false, false);
    debug!("Kafka destination module initialized");
}

#[no_mangle]
pub extern "C" fn torustiq_module_step_configure(args: ConfigureArgs) -> ConfigureFnResult {
    connector().configure(args.into()).into()
}

/// # Safety
///
/// `key` and `value` must be null or NUL-terminated strings valid for the
/// duration of the call.
#[no_mangle]
pub unsafe extern "C" fn torustiq_module_step_set_param(
    handle: ModuleHandle,
    key: *const c_char,
    value: *const c_char,
) {
    if let (Some(key), Some(value)) = (c_str_to_string(key), c_str_to_string(value)) {
        connector().set_param(handle, key, value);
    }
}

#[no_mangle]
pub extern "C" fn torustiq_module_step_start(handle: ModuleHandle) -> StartFnResult {
    match connector().start(handle) {
        Ok(()) => StartFnResult::Ok,
        Err(e) => StartFnResult::ErrorMisc(into_c_string(e.to_string())),
    }
}

/// # Safety
///
/// `input` must satisfy the requirements of [`FfiRecord::to_record`]. The
/// record stays owned by the host.
#[no_mangle]
pub unsafe extern "C" fn torustiq_module_process_record(
    input: FfiRecord,
    handle: ModuleHandle,
) -> ProcessRecordFnResult {
    let record = input.to_record();
    match connector().process_record(&record, handle) {
        Ok(()) => ProcessRecordFnResult::Ok,
        Err(e) => ProcessRecordFnResult::Err(into_c_string(e.to_string())),
    }
}

#[no_mangle]
pub extern "C" fn torustiq_module_step_shutdown(handle: ModuleHandle) {
    if let Some(stats) = connector().shutdown(handle) {
        debug!(handle, ?stats, "Final producer counters");
    }
}

/// Releases a record allocated by this module.
///
/// # Safety
///
/// `record` must come from [`FfiRecord::from_record`] and must not be used
/// or released again afterwards.
#[no_mangle]
pub unsafe extern "C" fn torustiq_module_free_record(record: FfiRecord) {
    if !record.content.bytes.is_null() {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            record.content.bytes,
            record.content.len,
        )));
    }

    if !record.metadata.data.is_null() {
        let entries = Box::from_raw(ptr::slice_from_raw_parts_mut(
            record.metadata.data,
            record.metadata.len as usize,
        ));
        for pair in entries.iter() {
            torustiq_module_free_char_ptr(pair.name);
            torustiq_module_free_char_ptr(pair.value);
        }
    }
}

/// Releases a string returned by this module.
///
/// # Safety
///
/// `c` must be null or come from this module, and must not be used or
/// released again afterwards.
#[no_mangle]
pub unsafe extern "C" fn torustiq_module_free_char_ptr(c: *const c_char) {
    if !c.is_null() {
        drop(CString::from_raw(c.cast_mut()));
    }
}
