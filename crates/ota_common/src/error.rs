//! Error types for the OTA agent.

use thiserror::Error;

/// Version string rejection reasons.
///
/// The parser is strict: every malformed input maps to the stage that
/// rejected it, so logs show exactly how far a bad descriptor got.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("version string is empty or missing the 'v' prefix")]
    MissingPrefix,

    #[error("malformed major version field")]
    MalformedMajor,

    #[error("malformed minor version field")]
    MalformedMinor,

    #[error("malformed patch version field")]
    MalformedPatch,

    #[error("malformed commit-distance field")]
    MalformedDistance,

    #[error("version parsed to 0.0.0, treating as garbage input")]
    DegenerateZeroVersion,
}

/// Comparison rejection: an unparseable version is never ordered
/// against a real one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("running firmware version is invalid: {0}")]
    InvalidCurrent(#[source] ParseError),

    #[error("target firmware version is invalid: {0}")]
    InvalidTarget(#[source] ParseError),
}

/// Failures reported by the storage partition collaborator.
///
/// `code` carries the device-level error code where the backend has one
/// (the flash driver's last-error register, an errno, etc).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("image of {requested} bytes does not fit the update partition")]
    ImageTooLarge { requested: u64 },

    #[error("update partition unavailable (code {code})")]
    Unavailable { code: i32 },

    #[error("chunk write rejected (code {code})")]
    Write { code: i32 },

    #[error("finalize failed (code {code})")]
    Finalize { code: i32 },

    #[error("no update in progress")]
    NotStarted,
}

/// Everything that can end an update cycle early.
///
/// All of these are non-fatal to the agent: the outer loop logs the
/// failure and retries at the next polling interval.
#[derive(Error, Debug)]
pub enum OtaError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("version check failed: server returned status {status}")]
    CheckFailed { status: u16 },

    #[error("firmware fetch failed: server returned status {status}")]
    FetchFailed { status: u16 },

    #[error("version parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("version comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("incomplete download: expected {expected} bytes, received {received}")]
    IncompleteDownload { expected: u64, received: u64 },

    #[error("image written and finalized but device reports it is not bootable with rollback, refusing to restart")]
    PostWriteIntegrityDoubt,

    #[error("built URL exceeds the {limit}-byte limit: {url}")]
    UrlTooLong { url: String, limit: usize },

    #[error("server did not report a content length for the firmware image")]
    MissingContentLength,

    #[error("restart request failed: {0}")]
    Restart(String),
}
