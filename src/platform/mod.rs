//! Operating system capabilities the cleanup depends on: resolving known folders (optionally as
//! another identity), borrowing the identity of a running system process and widening the ACL
//! of a folder.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        pub mod windows;
        pub use self::windows::WindowsPlatform as NativePlatform;
    }
}

pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KnownFolder {
    LocalAppData,
    RoamingAppData,
    /// The home directory of a user
    Profile,
    /// The folder containing every user's home directory
    UserProfiles,
    ProgramData,
    System,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to resolve known folder {0:?}: {1}")]
    KnownFolder(KnownFolder, #[source] PlatformError),
    #[error("Unable to adjust privilege {0}: {1}")]
    Privilege(&'static str, #[source] PlatformError),
    #[error("Unable to list running processes: {0}")]
    ProcessList(#[source] PlatformError),
    #[error("The \"{0}\" process is not running")]
    ProcessNotFound(String),
    #[error("Failed to access the \"{0}\" process: {1}")]
    OpenProcess(String, #[source] PlatformError),
    #[error("Failed to acquire process token for the \"{0}\" process: {1}")]
    ProcessToken(String, #[source] PlatformError),
    #[error("Failed to grant administrators access to {}: {1}", .0.display())]
    GrantAccess(PathBuf, #[source] PlatformError),
}

pub trait Platform {
    /// The security context of another account, folders resolved with it are the folders that
    /// account would see
    type Identity: Debug;

    fn known_folder(
        &self,
        folder: KnownFolder,
        identity: Option<&Self::Identity>,
    ) -> Result<PathBuf, Error>;

    /// Borrows the identity of the running process named `process_name`
    fn acquire_identity(&self, process_name: &str) -> Result<Self::Identity, Error>;

    /// Gives the built-in administrators group full control over `path` and its children
    fn grant_admin_access(&self, path: &Path) -> Result<(), Error>;
}
