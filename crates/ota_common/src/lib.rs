//! Shared library for the OTA update agent.
//!
//! Holds everything both the daemon and its tests need: the version
//! grammar, the error taxonomy, configuration, persisted update state,
//! the storage collaborator contract and device identity.

pub mod config;
pub mod error;
pub mod identity;
pub mod state;
pub mod version;
pub mod writer;

pub use config::OtaConfig;
pub use error::{CompareError, OtaError, ParseError, StorageError};
pub use identity::DeviceId;
pub use state::{LastOutcome, UpdateState};
pub use version::{compare, compare_parsed, parse, ComparisonResult, ParsedVersion};
pub use writer::FirmwareWriter;
