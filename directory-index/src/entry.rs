//! Directory entry descriptors.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symbolic link.
    Symlink,

    /// Anything else (sockets, devices, fifos).
    Other,
}

impl EntryKind {
    /// Lowercase name, as used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single child of an indexed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// File name without any directory part.
    pub basename: String,

    /// Path relative to the indexing root, `/`-separated.
    pub path: String,

    /// Absolute path on disk.
    pub abs_path: PathBuf,

    /// What kind of entry this is.
    pub kind: EntryKind,
}

impl Entry {
    /// Create an entry for `basename` inside `dir_path` (relative to `root`).
    pub fn new(
        root: &std::path::Path,
        dir_path: &str,
        basename: impl Into<String>,
        kind: EntryKind,
    ) -> Self {
        let basename = basename.into();
        let path = join_relative(dir_path, &basename);
        let abs_path = root.join(&path);

        Self {
            basename,
            path,
            abs_path,
            kind,
        }
    }

    /// Whether this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Join a relative directory path and a child name, treating `.` and the
/// empty string as the root itself.
pub fn join_relative(dir_path: &str, name: &str) -> String {
    let dir_path = dir_path.trim_start_matches("./").trim_end_matches('/');
    if dir_path.is_empty() || dir_path == "." {
        name.to_string()
    } else {
        format!("{dir_path}/{name}")
    }
}
