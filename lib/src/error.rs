//! Error taxonomy for the merge engine, following the core-generated
//! failure classes the orchestrator must distinguish between (transport,
//! catalog-open, integrity-fail, merge-fail, upload-fail, swap-fail).

use std::path::PathBuf;

/// Errors a [`crate::adapter::DeviceFileService`] implementation may raise.
///
/// `Transport` covers any failure of the underlying connection; `NotReady`
/// is distinct because the orchestrator's caller may want to retry rather
/// than abort (the device heartbeat channel may suspend the worker).
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("device not ready")]
    NotReady,
    #[error("path not found on device: {0}")]
    NotFound(PathBuf),
    #[error("transport error talking to device: {0}")]
    Transport(#[source] anyhow::Error),
}

/// Errors opening or migrating a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to open sqlite catalog: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("catalog schema version {found} is newer than supported version {expected}")]
    SchemaTooNew { found: u32, expected: u32 },
    #[error("failed to apply catalog schema: {0}")]
    Migration(#[source] rusqlite::Error),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// Errors decoding or encoding the ringtone index plist (spec §6.4).
#[derive(Debug, thiserror::Error)]
pub enum RingtonePlistError {
    #[error("malformed ringtone plist: {0}")]
    Malformed(String),
    #[error("xml error reading ringtone plist: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid integer in ringtone plist field {field}: {source}")]
    InvalidInteger {
        field: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// The top-level failure taxonomy for a merge, per the error handling
/// design: any of these is fatal to the *current* operation, and none of
/// them fall back to creating a fresh catalog when a live one already
/// exists.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("downloading catalog from device failed: {0}")]
    Transport(#[source] AdapterError),
    #[error("downloaded catalog could not be opened, aborting without replacing device catalog: {0}")]
    CatalogOpen(#[source] CatalogError),
    #[error("merge failed ({step}), device catalog was not replaced: {source}")]
    MergeFailed {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("uploading {what} to device failed, aborting: {source}")]
    UploadFailed {
        what: &'static str,
        #[source]
        source: AdapterError,
    },
    #[error("swapping staged catalog into place failed, staging file was removed: {0}")]
    SwapFailed(#[source] AdapterError),
}
