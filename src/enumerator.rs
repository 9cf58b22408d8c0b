//! Directory listing narrowed down by a chain of filters, an entry is yielded only when every
//! filter accepts it.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: OsString,
    pub kind: EntryKind,
}

impl Entry {
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name_lossy(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

impl TryFrom<fs::DirEntry> for Entry {
    type Error = io::Error;

    fn try_from(entry: fs::DirEntry) -> Result<Self, Self::Error> {
        let file_type = entry.file_type()?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(Entry::new(entry.file_name(), kind))
    }
}

pub type Filter = Box<dyn Fn(&Entry) -> bool>;

pub fn directories() -> Filter {
    Box::new(|e| e.kind == EntryKind::Directory)
}

pub fn files() -> Filter {
    Box::new(|e| e.kind == EntryKind::File)
}

/// Rejects the `.` and `..` pseudo entries
pub fn not_relative_dirs() -> Filter {
    Box::new(|e| e.name != "." && e.name != "..")
}

/// Accepts entries whose name is in `names`, ignoring case
pub fn named_any_of<I, S>(names: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = name_set(names);
    Box::new(move |e| set.contains(&e.name_lossy().to_lowercase()))
}

/// Accepts entries whose name is not in `names`, ignoring case
pub fn named_none_of<I, S>(names: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set = name_set(names);
    Box::new(move |e| !set.contains(&e.name_lossy().to_lowercase()))
}

fn name_set<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().to_lowercase())
        .collect()
}

/// Single pass over the entries of one directory
pub struct FileEnumerator {
    directory: PathBuf,
    entries: Box<dyn Iterator<Item = io::Result<Entry>>>,
    filters: Vec<Filter>,
}

impl FileEnumerator {
    pub fn new<P: AsRef<Path>>(directory: P) -> io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let entries = fs::read_dir(&directory)?.map(|r| r.and_then(Entry::try_from));
        Ok(Self {
            directory,
            entries: Box::new(entries),
            filters: vec![],
        })
    }

    /// Enumerates a fixed list of entries as if they had been read from `directory`
    pub fn from_entries<P, I>(directory: P, entries: I) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = Entry>,
        I::IntoIter: 'static,
    {
        Self {
            directory: directory.as_ref().to_path_buf(),
            entries: Box::new(entries.into_iter().map(Ok)),
            filters: vec![],
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Iterator for FileEnumerator {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.entries.next()? {
                Ok(entry) => {
                    if self.filters.iter().all(|f| f(&entry)) {
                        return Some(entry);
                    }
                }
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", self.directory.display(), e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(enumerator: FileEnumerator) -> Vec<String> {
        let mut names = enumerator.map(|e| e.name_lossy()).collect::<Vec<_>>();
        names.sort();
        names
    }

    fn sample() -> Vec<Entry> {
        vec![
            Entry::new(".", EntryKind::Directory),
            Entry::new("..", EntryKind::Directory),
            Entry::new("logs", EntryKind::Directory),
            Entry::new("settings.json", EntryKind::File),
            Entry::new("Relays.JSON", EntryKind::File),
            Entry::new("socket", EntryKind::Other),
        ]
    }

    #[test]
    fn unfiltered_yields_everything() {
        assert_eq!(FileEnumerator::from_entries("x", sample()).count(), 6);
    }

    #[test]
    fn filters_are_combined() {
        let e = FileEnumerator::from_entries("x", sample())
            .with_filter(directories())
            .with_filter(not_relative_dirs());
        assert_eq!(names(e), vec!["logs"]);
    }

    #[test]
    fn only_files() {
        let e = FileEnumerator::from_entries("x", sample()).with_filter(files());
        assert_eq!(names(e), vec!["Relays.JSON", "settings.json"]);
    }

    #[test]
    fn name_sets_ignore_case() {
        let e = FileEnumerator::from_entries("x", sample())
            .with_filter(files())
            .with_filter(named_any_of(["relays.json"]));
        assert_eq!(names(e), vec!["Relays.JSON"]);

        let e = FileEnumerator::from_entries("x", sample())
            .with_filter(files())
            .with_filter(named_none_of(["SETTINGS.json"]));
        assert_eq!(names(e), vec!["Relays.JSON"]);
    }

    #[test]
    fn reads_directory_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let e = FileEnumerator::new(dir.path()).unwrap();
        assert_eq!(e.directory(), dir.path());
        assert_eq!(names(e.with_filter(files())), vec!["a.txt", "b.txt"]);

        let e = FileEnumerator::new(dir.path()).unwrap().with_filter(directories());
        assert_eq!(names(e), vec!["sub"]);
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileEnumerator::new(dir.path().join("missing")).is_err());
    }
}
