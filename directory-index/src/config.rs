//! Configuration for directory indexing.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::entry::Entry;
use crate::error::{IndexError, Result};
use crate::naming::{NameCache, NameFn, default_name};
use crate::pattern::{Matcher, Pattern};

/// Keyword used to mark directory imports when none is configured.
pub const DEFAULT_KEYWORD: &str = "recursive";

/// Option names the generator reads from its loader options. The keyword
/// must not shadow any of them.
pub const RESERVED_KEYWORDS: [&str; 4] = ["fileSystem", "plugin", "root", "path"];

/// Immutable configuration shared by the interceptor and the generator.
pub struct IndexConfig {
    /// Query option that marks a directory import.
    keyword: String,

    /// Value the keyword must carry for a request to be ours.
    namespace: Value,

    /// Entries must match this to be exported.
    include: Matcher,

    /// Entries matching this are never exported.
    exclude: Matcher,

    /// Naming function.
    get_name: NameFn,

    /// Ignore pass-through requests whose generator loader was removed.
    suppress_removed_error: bool,

    /// Resolved names, owned for the lifetime of this configuration.
    names: NameCache,
}

impl IndexConfig {
    /// Start building a configuration.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn namespace(&self) -> &Value {
        &self.namespace
    }

    pub fn include(&self) -> &Matcher {
        &self.include
    }

    pub fn exclude(&self) -> &Matcher {
        &self.exclude
    }

    pub fn get_name(&self) -> &NameFn {
        &self.get_name
    }

    pub fn suppress_removed_error(&self) -> bool {
        self.suppress_removed_error
    }

    pub fn name_cache(&self) -> &NameCache {
        &self.names
    }

    /// Resolve the export name for an entry, see [`crate::naming::resolve_name`].
    pub fn resolve_name(&self, entry: &Entry) -> Result<Option<String>> {
        crate::naming::resolve_name(entry, self)
    }

    /// Whether `value` is this configuration's namespace marker.
    pub fn is_own_namespace(&self, value: Option<&Value>) -> bool {
        value == Some(&self.namespace)
    }
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("keyword", &self.keyword)
            .field("namespace", &self.namespace)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("suppress_removed_error", &self.suppress_removed_error)
            .finish_non_exhaustive()
    }
}

/// Builder for [`IndexConfig`].
pub struct IndexConfigBuilder {
    keyword: String,
    namespace: Value,
    include: Option<Pattern>,
    exclude: Option<Pattern>,
    get_name: NameFn,
    suppress_removed_error: bool,
}

impl Default for IndexConfigBuilder {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            namespace: Value::Bool(true),
            include: None,
            exclude: None,
            get_name: Arc::new(default_name),
            suppress_removed_error: false,
        }
    }
}

impl IndexConfigBuilder {
    /// Set the query keyword.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Set the namespace marker.
    pub fn namespace(mut self, namespace: impl Into<Value>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the include pattern.
    pub fn include(mut self, pattern: impl Into<Pattern>) -> Self {
        self.include = Some(pattern.into());
        self
    }

    /// Set the exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<Pattern>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    /// Set a custom naming function.
    pub fn get_name<F>(mut self, get_name: F) -> Self
    where
        F: Fn(&Entry) -> Result<String> + Send + Sync + 'static,
    {
        self.get_name = Arc::new(get_name);
        self
    }

    /// Silence the missing-loader error on pass-through requests.
    pub fn suppress_removed_error(mut self, suppress: bool) -> Self {
        self.suppress_removed_error = suppress;
        self
    }

    /// Validate the keyword and namespace, then compile the patterns.
    pub fn build(self) -> Result<IndexConfig> {
        if RESERVED_KEYWORDS.contains(&self.keyword.as_str()) {
            return Err(IndexError::Configuration(format!(
                "Invalid keyword: {}",
                self.keyword
            )));
        }
        if self.namespace.is_null() {
            return Err(IndexError::Configuration(
                "namespace must not be null".to_string(),
            ));
        }
        if !matches!(self.namespace, Value::String(_) | Value::Bool(true)) {
            warn!(
                "Namespace {} cannot be encoded into a request; nested directories will fail to index",
                self.namespace
            );
        }

        Ok(IndexConfig {
            include: Matcher::new(self.include.as_ref(), true)?,
            exclude: Matcher::new(self.exclude.as_ref(), false)?,
            keyword: self.keyword,
            namespace: self.namespace,
            get_name: self.get_name,
            suppress_removed_error: self.suppress_removed_error,
            names: NameCache::new(),
        })
    }
}

/// Declarative configuration, as read from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Query keyword.
    pub keyword: String,

    /// Namespace marker.
    pub namespace: Value,

    /// Include globs.
    pub include: Vec<String>,

    /// Include regular expressions, evaluated after the globs.
    pub include_regex: Vec<String>,

    /// Exclude globs.
    pub exclude: Vec<String>,

    /// Exclude regular expressions, evaluated after the globs.
    pub exclude_regex: Vec<String>,

    /// See [`IndexConfigBuilder::suppress_removed_error`].
    pub suppress_removed_error: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            namespace: Value::Bool(true),
            include: Vec::new(),
            include_regex: Vec::new(),
            exclude: Vec::new(),
            exclude_regex: Vec::new(),
            suppress_removed_error: false,
        }
    }
}

impl IndexOptions {
    /// Parse options from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Build the runtime configuration.
    pub fn into_config(self) -> Result<IndexConfig> {
        let mut builder = IndexConfig::builder()
            .keyword(self.keyword)
            .namespace(self.namespace)
            .suppress_removed_error(self.suppress_removed_error);

        if let Some(include) = patterns(self.include, self.include_regex)? {
            builder = builder.include(include);
        }
        if let Some(exclude) = patterns(self.exclude, self.exclude_regex)? {
            builder = builder.exclude(exclude);
        }

        builder.build()
    }
}

fn patterns(globs: Vec<String>, regexes: Vec<String>) -> Result<Option<Pattern>> {
    if globs.is_empty() && regexes.is_empty() {
        return Ok(None);
    }

    let mut list: Vec<Pattern> = globs.into_iter().map(Pattern::Glob).collect();
    for re in regexes {
        let compiled = Regex::new(&re).map_err(|e| IndexError::InvalidPattern {
            pattern: re.clone(),
            message: e.to_string(),
        })?;
        list.push(Pattern::Regex(compiled));
    }

    Ok(Some(Pattern::List(list)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::builder().build().unwrap();

        assert_eq!(config.keyword(), "recursive");
        assert_eq!(config.namespace(), &json!(true));
        assert!(config.include().is_empty());
        assert!(config.exclude().is_empty());
        assert!(!config.suppress_removed_error());
    }

    #[test]
    fn test_reserved_keywords_rejected() {
        for keyword in RESERVED_KEYWORDS {
            let err = IndexConfig::builder().keyword(keyword).build().unwrap_err();
            assert!(matches!(err, IndexError::Configuration(_)), "{keyword}");
        }
    }

    #[test]
    fn test_null_namespace_rejected() {
        let err = IndexConfig::builder()
            .namespace(Value::Null)
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[traced_test]
    #[test]
    fn test_unencodable_namespace_warns() {
        let config = IndexConfig::builder().namespace(5).build().unwrap();
        assert_eq!(config.namespace(), &json!(5));
        assert!(logs_contain("Namespace 5 cannot be encoded"));
    }

    #[traced_test]
    #[test]
    fn test_string_namespace_does_not_warn() {
        IndexConfig::builder().namespace("icons").build().unwrap();
        IndexConfig::builder().namespace(true).build().unwrap();
        assert!(!logs_contain("cannot be encoded"));
    }

    #[test]
    fn test_own_namespace() {
        let config = IndexConfig::builder().namespace("icons").build().unwrap();

        assert!(config.is_own_namespace(Some(&json!("icons"))));
        assert!(!config.is_own_namespace(Some(&json!(true))));
        assert!(!config.is_own_namespace(None));
    }

    #[test]
    fn test_options_from_toml() {
        let options = IndexOptions::from_toml_str(
            r#"
            keyword = "dir"
            namespace = "components"
            include = ["**/*.tsx"]
            exclude_regex = ["\\.stories\\."]
            "#,
        )
        .unwrap();

        assert_eq!(options.keyword, "dir");
        assert_eq!(options.namespace, json!("components"));
        assert_eq!(options.include, vec!["**/*.tsx".to_string()]);
        assert!(!options.suppress_removed_error);

        let config = options.into_config().unwrap();
        assert_eq!(config.include().len(), 1);
        assert_eq!(config.exclude().len(), 1);

        let story = Entry::new(Path::new("/r"), ".", "Button.stories.tsx", EntryKind::File);
        assert_eq!(config.resolve_name(&story).unwrap(), None);
    }

    #[test]
    fn test_options_reject_bad_regex() {
        let options = IndexOptions {
            include_regex: vec!["(".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            options.into_config(),
            Err(IndexError::InvalidPattern { .. })
        ));
    }
}
