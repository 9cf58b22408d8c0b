//! Removes what Mullvad VPN leaves behind once uninstalled: logs and caches of every user,
//! and the logs, caches and settings of the service account.

pub mod cleanup;
pub mod common;
pub mod enumerator;
pub mod path_tokens;
pub mod platform;
pub mod users;
#[cfg(windows)]
mod wide;

pub use cleanup::{Cleaner, Operation, OperationOutcome};
