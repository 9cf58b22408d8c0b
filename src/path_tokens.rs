//! Relates two paths to each other by their components, so that a folder known for the current
//! user (such as local app data) can be located for every other user on the machine.

use crate::common::PATH_SEPARATORS;
use std::path::{Path, PathBuf};

/// Splits `path` on any of `separators`, dropping empty components
pub fn tokenize(path: &str, separators: &[char]) -> Vec<String> {
    path.split(|c| separators.contains(&c))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Tokenizes a path using both forward and backward slashes
pub fn path_tokens(path: &Path) -> Vec<String> {
    tokenize(&path.to_string_lossy(), &PATH_SEPARATORS)
}

/// Number of leading elements of `lhs` and `rhs` that are pairwise equal according to `eq`
pub fn mirrored_prefix_len_by<T, F>(lhs: &[T], rhs: &[T], mut eq: F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    lhs.iter()
        .zip(rhs.iter())
        .take_while(|(l, r)| eq(l, r))
        .count()
}

/// Number of leading tokens shared by both sequences, ignoring case
pub fn equal_tokens_count<S: AsRef<str>>(lhs: &[S], rhs: &[S]) -> usize {
    mirrored_prefix_len_by(lhs, rhs, |l, r| eq_ignore_case(l.as_ref(), r.as_ref()))
}

fn eq_ignore_case(lhs: &str, rhs: &str) -> bool {
    lhs.chars()
        .flat_map(char::to_lowercase)
        .eq(rhs.chars().flat_map(char::to_lowercase))
}

/// The tokens of `target` below `reference`.
///
/// Returns `None` when `target` is not located beneath `reference`, in which case nothing can be
/// assumed about where the equivalent folder lives for another user.
pub fn relative_tokens<'t, S: AsRef<str>>(reference: &[S], target: &'t [S]) -> Option<&'t [S]> {
    let count = equal_tokens_count(target, reference);
    if count < reference.len() {
        return None;
    }
    Some(&target[count..])
}

/// Builds `<users>\<user>\<relative...>`
pub fn construct_user_path<S: AsRef<str>>(users: &Path, user: &str, relative: &[S]) -> PathBuf {
    let mut path = users.join(user);
    for token in relative {
        path.push(token.as_ref());
    }
    path
}
