//! Export name derivation and validation.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;
use tracing::debug;

use crate::config::IndexConfig;
use crate::entry::{Entry, EntryKind};
use crate::error::{IndexError, Result};

/// Maps an entry to the export name it should be bound to.
pub type NameFn = Arc<dyn Fn(&Entry) -> Result<String> + Send + Sync>;

/// Default naming: files lose everything from the first `.` after the
/// first character, directories and symlinks keep their basename.
///
/// `index.test.js` becomes `index`, while `.env` stays `.env` (and is later
/// rejected as an identifier).
pub fn default_name(entry: &Entry) -> Result<String> {
    match entry.kind {
        EntryKind::File => {
            let basename = &entry.basename;
            let stem = basename
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '.')
                .map_or(basename.as_str(), |(i, _)| &basename[..i]);
            Ok(stem.to_string())
        }
        EntryKind::Directory | EntryKind::Symlink => Ok(entry.basename.clone()),
        EntryKind::Other => Err(IndexError::UnsupportedEntryType(entry.kind.to_string())),
    }
}

const INVALID_CHAR_PATTERN: &str = r"[^\p{L}$_0-9]";

fn invalid_char_regex() -> Result<&'static Regex> {
    static REGEX: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(INVALID_CHAR_PATTERN))
        .as_ref()
        .map_err(|e| IndexError::InvalidPattern {
            pattern: INVALID_CHAR_PATTERN.to_string(),
            message: e.to_string(),
        })
}

/// Check that `name` can be used as an ECMAScript binding: letters, `$`,
/// `_` and ASCII digits only, not starting with a digit.
pub fn validate_identifier(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "Cannot be empty"
    } else if invalid_char_regex()?.is_match(name) {
        "Cannot contain invalid characters"
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        "Cannot start with digit"
    } else {
        return Ok(());
    };

    Err(IndexError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    })
}

/// Memo of resolved names keyed by `(kind, relative path)`.
///
/// Lives as long as the [`IndexConfig`] that owns it. Entries are never
/// invalidated: a name is a pure function of the entry under a fixed
/// configuration, so concurrent inserts of the same key are harmless.
#[derive(Debug, Default)]
pub struct NameCache {
    names: RwLock<HashMap<(EntryKind, String), Option<String>>>,
}

impl NameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, entry: &Entry) -> Option<Option<String>> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(entry.kind, entry.path.clone()))
            .cloned()
    }

    fn insert(&self, entry: &Entry, name: Option<String>) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((entry.kind, entry.path.clone()), name);
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been memoized yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decide whether `entry` is exported and under which name.
///
/// Returns `Ok(None)` when the entry is filtered out by the include or
/// exclude patterns. Failures are not memoized.
pub fn resolve_name(entry: &Entry, config: &IndexConfig) -> Result<Option<String>> {
    if let Some(cached) = config.name_cache().get(entry) {
        return Ok(cached);
    }

    let name = if !config.include().matches(entry) || config.exclude().matches(entry) {
        debug!("Skipping filtered entry: {}", entry.path);
        None
    } else {
        let name = (config.get_name())(entry)?;
        validate_identifier(&name)?;
        Some(name)
    };

    config.name_cache().insert(entry, name.clone());
    Ok(name)
}
