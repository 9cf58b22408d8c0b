//! Finds the profile folders of every user other than the current one

use crate::common::NON_USER_PROFILES;
use crate::enumerator::{self, FileEnumerator};
use std::io;
use std::path::Path;

/// Profile folder names under `profiles_root`, excluding `current_user` and pseudo accounts
pub fn other_users(
    profiles_root: &Path,
    current_user: &str,
) -> io::Result<impl Iterator<Item = String>> {
    Ok(other_users_in(
        FileEnumerator::new(profiles_root)?,
        current_user,
    ))
}

pub fn other_users_in(
    enumerator: FileEnumerator,
    current_user: &str,
) -> impl Iterator<Item = String> {
    let excluded = NON_USER_PROFILES
        .iter()
        .copied()
        .chain(std::iter::once(current_user));
    enumerator
        .with_filter(enumerator::directories())
        .with_filter(enumerator::not_relative_dirs())
        .with_filter(enumerator::named_none_of(excluded))
        .map(|e| e.name_lossy())
}
