//! Filesystem handles used to enumerate directories.
//!
//! The host bundler owns the filesystem (it may be the real disk, or an
//! in-memory tree). The generator only ever lists a directory and stats
//! its children, so that is all a handle has to provide.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::fs;

use crate::entry::EntryKind;

/// Metadata for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    kind: EntryKind,
}

impl FileStat {
    /// Create a stat result for the given kind.
    pub fn new(kind: EntryKind) -> Self {
        Self { kind }
    }

    /// Check if the path is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Check if the path is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Get the entry kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

/// Filesystem operations needed to index a directory.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List the names of a directory's immediate children.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Stat a path, following symbolic links.
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;
}

/// The real filesystem, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

#[async_trait]
impl FileSystem for OsFileSystem {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut dir = fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        // Directory order is platform dependent; keep output stable.
        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::metadata(path).await?;
        let kind = if metadata.is_file() {
            EntryKind::File
        } else if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        };
        Ok(FileStat::new(kind))
    }
}

/// An in-memory tree of files and directories.
///
/// Paths are stored as given; parents are created implicitly.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, EntryKind>>,
}

impl MemoryFileSystem {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), EntryKind::File);
    }

    /// Add an empty directory, creating its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), EntryKind::Directory);
    }

    /// Add a node of any kind, creating its parents.
    pub fn add(&self, path: impl AsRef<Path>, kind: EntryKind) {
        self.insert(path.as_ref(), kind);
    }

    fn insert(&self, path: &Path, kind: EntryKind) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        for parent in path.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            nodes
                .entry(parent.to_path_buf())
                .or_insert(EntryKind::Directory);
        }
        nodes.insert(path.to_path_buf(), kind);
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(path) {
            Some(EntryKind::Directory) => {}
            Some(_) => {
                return Err(io::Error::other(format!(
                    "ENOTDIR: not a directory, scandir '{}'",
                    path.display()
                )));
            }
            None => return Err(not_found("scandir", path)),
        }

        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes
            .get(path)
            .map(|&kind| FileStat::new(kind))
            .ok_or_else(|| not_found("stat", path))
    }
}

fn not_found(op: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "ENOENT: no such file or directory, {op} '{}'",
            path.display()
        ),
    )
}
