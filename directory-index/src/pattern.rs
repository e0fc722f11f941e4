//! Include/exclude patterns.
//!
//! A [`Pattern`] is normalized into a [`Matcher`]: an ordered list of leaf
//! predicates folded left to right. Each leaf answers `Some(true)`,
//! `Some(false)` or `None` (no opinion). Glob and regex leaves only give a
//! hard `false` for files; a directory that does not match yields `None`,
//! since a deep glob such as `**/*.js` may still match its descendants.

use std::fmt;
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::entry::Entry;
use crate::error::{IndexError, Result};

/// A user-supplied predicate over entries.
pub type EntryPredicate = Arc<dyn Fn(&Entry) -> Option<bool> + Send + Sync>;

/// An include or exclude specification.
#[derive(Clone)]
pub enum Pattern {
    /// Glob matched against the `/`-prefixed relative path.
    Glob(String),

    /// Regular expression searched in the relative path.
    Regex(Regex),

    /// Custom predicate; its answer is used as-is.
    Predicate(EntryPredicate),

    /// Several patterns, evaluated in order.
    List(Vec<Pattern>),
}

impl Pattern {
    /// Build a predicate pattern from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Entry) -> Option<bool> + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glob(glob) => f.debug_tuple("Glob").field(glob).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::List(list) => f.debug_tuple("List").field(list).finish(),
        }
    }
}

impl From<&str> for Pattern {
    fn from(glob: &str) -> Self {
        Self::Glob(glob.to_string())
    }
}

impl From<String> for Pattern {
    fn from(glob: String) -> Self {
        Self::Glob(glob)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for Pattern {
    fn from(list: Vec<P>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone)]
enum Leaf {
    Glob(GlobMatcher),
    Regex(Regex),
    Predicate(EntryPredicate),
}

impl Leaf {
    fn test(&self, entry: &Entry) -> Option<bool> {
        let matched = match self {
            Self::Glob(glob) => glob.is_match(format!("/{}", entry.path)),
            Self::Regex(re) => re.is_match(&entry.path),
            Self::Predicate(predicate) => return predicate(entry),
        };

        if matched {
            Some(true)
        } else if entry.is_file() {
            Some(false)
        } else {
            None
        }
    }
}

/// A normalized, three-valued include/exclude predicate.
#[derive(Clone)]
pub struct Matcher {
    leaves: Vec<Leaf>,
    fallback: bool,
}

impl Matcher {
    /// Normalize a pattern. An absent pattern matches nothing and always
    /// answers `fallback`.
    pub fn new(pattern: Option<&Pattern>, fallback: bool) -> Result<Self> {
        let mut leaves = Vec::new();
        if let Some(pattern) = pattern {
            flatten(pattern, &mut leaves)?;
        }
        Ok(Self { leaves, fallback })
    }

    /// Evaluate the matcher against an entry.
    pub fn matches(&self, entry: &Entry) -> bool {
        let mut answer = self.fallback;
        for leaf in &self.leaves {
            answer = leaf.test(entry).unwrap_or(answer);
            if answer {
                return true;
            }
        }
        answer
    }

    /// Number of leaf predicates after flattening.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the pattern flattened to no leaves at all.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("leaves", &self.leaves.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}

fn flatten(pattern: &Pattern, leaves: &mut Vec<Leaf>) -> Result<()> {
    match pattern {
        Pattern::Glob(glob) => {
            let matcher = GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .map_err(|e| IndexError::InvalidPattern {
                    pattern: glob.clone(),
                    message: e.to_string(),
                })?
                .compile_matcher();
            leaves.push(Leaf::Glob(matcher));
        }
        Pattern::Regex(re) => leaves.push(Leaf::Regex(re.clone())),
        Pattern::Predicate(predicate) => leaves.push(Leaf::Predicate(predicate.clone())),
        Pattern::List(list) => {
            for pattern in list {
                flatten(pattern, leaves)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use std::path::Path;

    fn file(path: &str) -> Entry {
        entry(path, EntryKind::File)
    }

    fn dir(path: &str) -> Entry {
        entry(path, EntryKind::Directory)
    }

    fn entry(path: &str, kind: EntryKind) -> Entry {
        let basename = path.rsplit('/').next().unwrap_or(path);
        let dir_path = path.strip_suffix(basename).unwrap_or("");
        Entry::new(Path::new("/root"), dir_path, basename, kind)
    }

    #[test]
    fn test_glob_matches_files() {
        let include = Matcher::new(Some(&vec!["**/*.js"].into()), false).unwrap();

        assert!(include.matches(&file("foo.js")));
        assert!(include.matches(&file("deep/er/foo.js")));
        assert!(!include.matches(&file("foo.css")));
    }

    #[test]
    fn test_directories_defer_to_fallback() {
        let pattern: Pattern = vec!["**/*.js"].into();

        let include = Matcher::new(Some(&pattern), true).unwrap();
        assert!(include.matches(&dir("src")));

        let exclude = Matcher::new(Some(&pattern), false).unwrap();
        assert!(!exclude.matches(&dir("src")));
    }

    #[test]
    fn test_absent_pattern_uses_fallback() {
        assert!(Matcher::new(None, true).unwrap().matches(&file("a.js")));
        assert!(!Matcher::new(None, false).unwrap().matches(&file("a.js")));
        assert!(Matcher::new(None, true).unwrap().is_empty());
    }

    #[test]
    fn test_regex_is_unanchored() {
        let re = Regex::new(r"\.test\.").unwrap();
        let matcher = Matcher::new(Some(&re.into()), false).unwrap();

        assert!(matcher.matches(&file("lib/a.test.js")));
        assert!(!matcher.matches(&file("lib/a.js")));
    }

    #[test]
    fn test_predicate_result_is_used_as_is() {
        // A predicate can veto a directory outright, and `None` leaves the
        // running answer untouched.
        let pattern = Pattern::List(vec![
            Pattern::predicate(|e| (e.basename == "private").then_some(false)),
            "**/*.js".into(),
        ]);
        let matcher = Matcher::new(Some(&pattern), true).unwrap();

        assert!(!matcher.matches(&dir("private")));
        assert!(matcher.matches(&dir("public")));
        assert!(matcher.matches(&file("private/a.js")));
    }

    #[test]
    fn test_first_true_short_circuits() {
        let pattern = Pattern::List(vec![
            "**/*.md".into(),
            Pattern::predicate(|_| panic!("should not be evaluated")),
        ]);
        let matcher = Matcher::new(Some(&pattern), false).unwrap();

        assert!(matcher.matches(&file("README.md")));
    }

    #[test]
    fn test_nested_lists_flatten_in_order() {
        let pattern = Pattern::List(vec![
            "a".into(),
            Pattern::List(vec!["b".into(), Pattern::List(vec!["c".into()])]),
        ]);
        assert_eq!(Matcher::new(Some(&pattern), false).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_glob() {
        let err = Matcher::new(Some(&"[".into()), false).unwrap_err();
        assert!(matches!(err, IndexError::InvalidPattern { .. }));
    }
}
