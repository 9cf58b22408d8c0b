//! Common constants and helper functions shared by the library and the CLI

use anyhow::Context;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

pub const APP_NAME: &str = "Mullvad VPN";

/// Name of the product folder inside each of the app data roots
pub const APP_DIRECTORY_NAME: &str = "Mullvad VPN";

pub const ACCOUNT_HISTORY_FILE: &str = "account-history.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Files in the service account's product folder that are considered settings, everything else
/// in that folder is cache
pub const SETTINGS_FILES: [&str; 2] = [ACCOUNT_HISTORY_FILE, SETTINGS_FILE];

pub const RELAY_CACHE_FILE: &str = "relays.json";
pub const API_ADDRESS_CACHE_FILE: &str = "api-ip-address.txt";

/// A process that always runs as the local system account
pub const SERVICE_ACCOUNT_PROCESS: &str = "lsass.exe";

/// Profile folders that are not real user accounts
pub const NON_USER_PROFILES: [&str; 2] = [
    // Redirects to the program data folder
    "All Users",
    // Shared documents, not a user or a user template
    "Public",
];

pub const PATH_SEPARATORS: [char; 2] = ['\\', '/'];

pub fn install_logger(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = simplelog::ConfigBuilder::default()
        .set_target_level(LevelFilter::Debug)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        filter,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Unable to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(filter, config, file));
    }
    CombinedLogger::init(loggers)?;
    if debug {
        log::warn!("Debug logging enabled");
    }
    Ok(())
}

/// Removes a single file, a file that is already gone is not an error
pub fn remove_file_if_exists<P: AsRef<Path>>(p: P) -> std::io::Result<()> {
    log::info!("Removing file {}", p.as_ref().display());
    match std::fs::remove_file(p) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        r => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_file_if_exists(dir.path().join(RELAY_CACHE_FILE)).unwrap();
    }

    #[test]
    fn removes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(API_ADDRESS_CACHE_FILE);
        std::fs::write(&file, "10.0.0.1").unwrap();
        remove_file_if_exists(&file).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn removing_a_directory_as_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_file_if_exists(dir.path()).is_err());
    }
}
