//! OTA update agent daemon library.

pub mod agent;
pub mod partition;
pub mod platform;
pub mod session;
pub mod transport;
