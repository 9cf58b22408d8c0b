//! The cleanup steps run by the uninstaller. Each step is independent of the others, apart from
//! the service account's product folder which is only removed once both its cache and its
//! settings are gone.

use crate::common::{
    API_ADDRESS_CACHE_FILE, APP_DIRECTORY_NAME, RELAY_CACHE_FILE, SERVICE_ACCOUNT_PROCESS,
    SETTINGS_FILES,
};
use crate::enumerator::{self, FileEnumerator, Filter};
use crate::path_tokens::{construct_user_path, path_tokens, relative_tokens};
use crate::platform::{KnownFolder, Platform};
use crate::{common, users};
use anyhow::Context;
use enum_iterator::Sequence;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Sequence, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Logs and cache of the user running the uninstaller
    CurrentUserLogsCache,
    /// Logs and cache of every other user on the machine
    OtherUsersLogsCache,
    /// The cached API address of the service
    ServiceApiAddressCache,
    /// Logs written by the service
    ServiceUserLogs,
    /// The relay list cached by the service
    ServiceUserRelayCache,
    /// Everything but the settings in the service account's app data
    ServiceUserCache,
    /// The settings and account history in the service account's app data
    ServiceUserSettings,
}

impl Operation {
    pub fn run<P: Platform>(self, cleaner: &Cleaner<P>) -> anyhow::Result<()> {
        match self {
            Operation::CurrentUserLogsCache => cleaner.remove_logs_cache_current_user(),
            Operation::OtherUsersLogsCache => cleaner.remove_logs_cache_other_users(),
            Operation::ServiceApiAddressCache => cleaner.remove_api_address_cache_service_user(),
            Operation::ServiceUserLogs => cleaner.remove_logs_service_user(),
            Operation::ServiceUserRelayCache => cleaner.remove_relay_cache_service_user(),
            Operation::ServiceUserCache => cleaner.remove_cache_service_user(),
            Operation::ServiceUserSettings => cleaner.remove_settings_service_user(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub error: Option<String>,
}

pub struct Cleaner<P> {
    platform: P,
}

impl<P: Platform> Cleaner<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Runs every operation in turn, a failed operation does not stop the ones after it
    pub fn run<I>(&self, operations: I) -> Vec<OperationOutcome>
    where
        I: IntoIterator<Item = Operation>,
    {
        operations
            .into_iter()
            .map(|operation| {
                log::info!("Running {:?}", operation);
                let error = operation.run(self).err().map(|e| {
                    log::error!("{:?} failed: {:#}", operation, e);
                    format!("{:#}", e)
                });
                OperationOutcome { operation, error }
            })
            .collect()
    }

    fn known_folder(&self, folder: KnownFolder) -> anyhow::Result<PathBuf> {
        Ok(self.platform.known_folder(folder, None)?)
    }

    pub fn remove_logs_cache_current_user(&self) -> anyhow::Result<()> {
        let app_dir = self
            .known_folder(KnownFolder::LocalAppData)?
            .join(APP_DIRECTORY_NAME);
        log::info!("Deleting folder {}", app_dir.display());
        fs::remove_dir_all(&app_dir)
            .with_context(|| format!("Unable to delete {}", app_dir.display()))?;

        let roaming_app_dir = self
            .known_folder(KnownFolder::RoamingAppData)?
            .join(APP_DIRECTORY_NAME);
        remove_dir_all_best_effort(&roaming_app_dir);
        Ok(())
    }

    pub fn remove_logs_cache_other_users(&self) -> anyhow::Result<()> {
        let local_app_data = path_tokens(&self.known_folder(KnownFolder::LocalAppData)?);
        let roaming_app_data = path_tokens(&self.known_folder(KnownFolder::RoamingAppData)?);
        let home_dir = path_tokens(&self.known_folder(KnownFolder::Profile)?);

        // Local app data may be redirected, but anywhere outside the home directory there is no
        // telling where it lives for other users
        let Some(relative_local) = relative_tokens(&home_dir, &local_app_data) else {
            log::info!("Local app data is not beneath the home directory, skipping other users");
            return Ok(());
        };
        let relative_roaming = relative_tokens(&home_dir, &roaming_app_data);
        if relative_roaming.is_none() {
            log::info!("Roaming app data is not beneath the home directory, skipping it");
        }

        let current_user = home_dir
            .last()
            .context("Home directory has no path components")?;
        let profiles = self.known_folder(KnownFolder::UserProfiles)?;
        let others = users::other_users(&profiles, current_user)
            .with_context(|| format!("Unable to list user profiles in {}", profiles.display()))?;

        for user in others {
            let target =
                construct_user_path(&profiles, &user, relative_local).join(APP_DIRECTORY_NAME);
            remove_dir_all_best_effort(&target);

            if let Some(relative_roaming) = relative_roaming {
                let target = construct_user_path(&profiles, &user, relative_roaming)
                    .join(APP_DIRECTORY_NAME);
                remove_dir_all_best_effort(&target);
            }
        }
        Ok(())
    }

    pub fn remove_logs_service_user(&self) -> anyhow::Result<()> {
        let app_dir = self
            .known_folder(KnownFolder::ProgramData)?
            .join(APP_DIRECTORY_NAME);
        log::info!("Deleting folder {}", app_dir.display());
        fs::remove_dir_all(&app_dir)
            .with_context(|| format!("Unable to delete {}", app_dir.display()))?;
        Ok(())
    }

    pub fn remove_cache_service_user(&self) -> anyhow::Result<()> {
        let app_dir = self.service_app_directory()?;
        self.remove_service_files(&app_dir, enumerator::named_none_of(SETTINGS_FILES))
    }

    pub fn remove_settings_service_user(&self) -> anyhow::Result<()> {
        let app_dir = self.service_app_directory()?;
        self.remove_service_files(&app_dir, enumerator::named_any_of(SETTINGS_FILES))
    }

    pub fn remove_relay_cache_service_user(&self) -> anyhow::Result<()> {
        let app_dir = self.service_app_directory()?;
        self.remove_guarded_file(&app_dir, RELAY_CACHE_FILE)
    }

    pub fn remove_api_address_cache_service_user(&self) -> anyhow::Result<()> {
        let app_dir = self
            .known_folder(KnownFolder::ProgramData)?
            .join(APP_DIRECTORY_NAME);
        self.remove_guarded_file(&app_dir, API_ADDRESS_CACHE_FILE)
    }

    /// The product folder in local app data of the account the service runs as
    fn service_app_directory(&self) -> anyhow::Result<PathBuf> {
        let identity = self.platform.acquire_identity(SERVICE_ACCOUNT_PROCESS)?;
        let local_app_data = self
            .platform
            .known_folder(KnownFolder::LocalAppData, Some(&identity))?;
        Ok(local_app_data.join(APP_DIRECTORY_NAME))
    }

    fn remove_service_files(&self, app_dir: &Path, filter: Filter) -> anyhow::Result<()> {
        if !folder_exists(app_dir)? {
            return Ok(());
        }
        self.platform.grant_admin_access(app_dir)?;

        let targets = FileEnumerator::new(app_dir)
            .with_context(|| format!("Unable to list {}", app_dir.display()))?
            .with_filter(enumerator::files())
            .with_filter(filter)
            .map(|e| app_dir.join(e.name))
            .collect::<Vec<_>>();
        for target in targets {
            log::info!("Removing file {}", target.display());
            if let Err(e) = fs::remove_file(&target) {
                log::warn!("Unable to remove {}: {}", target.display(), e);
            }
        }

        // Fails while either the cache or the settings remain
        match fs::remove_dir(app_dir) {
            Ok(_) => log::info!("Removed folder {}", app_dir.display()),
            Err(e) => log::debug!("Keeping folder {}: {}", app_dir.display(), e),
        }
        Ok(())
    }

    fn remove_guarded_file(&self, app_dir: &Path, file_name: &str) -> anyhow::Result<()> {
        if !folder_exists(app_dir)? {
            return Ok(());
        }
        self.platform.grant_admin_access(app_dir)?;
        let target = app_dir.join(file_name);
        common::remove_file_if_exists(&target)
            .with_context(|| format!("Unable to remove {}", target.display()))
    }
}

/// Only a folder that is certainly gone counts as missing, any other failure to inspect it is an
/// error
fn folder_exists(path: &Path) -> anyhow::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("{} does not exist", path.display());
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Unable to inspect {}", path.display())),
    }
}

fn remove_dir_all_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(_) => log::info!("Deleted folder {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("{} does not exist", path.display())
        }
        Err(e) => log::warn!("Unable to delete {}: {}", path.display(), e),
    }
}
