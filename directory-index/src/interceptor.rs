//! Request interception.
//!
//! A directory import looks like `./components?recursive`. Before the host
//! resolves it, [`DirectoryIndexPlugin::before_resolve`] rewrites it into an
//! inline-loader request that runs the generator over a fixed pass-through
//! resource:
//!
//! ```text
//! ./components?recursive
//!   └─► !!<LOADER>?recursive&path=%2Fproj%2Fcomponents!<PASS_THROUGH_RESOURCE>
//! ```
//!
//! Once resolved, [`DirectoryIndexPlugin::after_resolve`] swaps the loader's
//! query-string options for a typed [`IndexingContext`], and
//! [`DirectoryIndexPlugin::load`] runs the generator with it. Nested
//! directories are emitted as `<abs path>?recursive&root=<root>`, so the same
//! cycle repeats for them with the original root preserved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_absolutize::Absolutize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::fs::FileSystem;
use crate::generator::{GeneratedModule, IndexingContext, generate};
use crate::query::{self, OptionSet};

/// Loader id the generator is registered under.
pub const LOADER: &str = "codex-directory-index/loader";

/// Empty resource the generator loader runs over.
pub const PASS_THROUGH_RESOURCE: &str = "codex-directory-index/null";

/// Stage for the before-resolve tap, ahead of the host's default taps so the
/// keyword is seen before anything else rewrites the request.
pub const BEFORE_RESOLVE_STAGE: i32 = 1;

/// Options attached to a loader in a resolved request.
#[derive(Debug, Clone)]
pub enum LoaderOptions {
    /// Raw query string, as written in the request.
    Query(String),

    /// Indexing context injected by the interceptor.
    Context(IndexingContext),
}

/// One loader of a resolved request.
#[derive(Debug, Clone)]
pub struct LoaderEntry {
    /// Loader id.
    pub loader: String,

    /// Loader options.
    pub options: LoaderOptions,

    /// Identity the host caches the loader under. Set to the original
    /// query string once the options are replaced by a live context.
    pub ident: Option<String>,
}

impl LoaderEntry {
    /// Create a loader entry carrying raw query-string options.
    pub fn new(loader: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: LoaderOptions::Query(options.into()),
            ident: None,
        }
    }

    /// The injected indexing context, if any.
    pub fn context(&self) -> Option<&IndexingContext> {
        match &self.options {
            LoaderOptions::Context(ctx) => Some(ctx),
            LoaderOptions::Query(_) => None,
        }
    }
}

/// A request after host resolution: the resource plus its loader chain.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    /// Resolved resource.
    pub resource: String,

    /// Loaders to run over the resource, in order.
    pub loaders: Vec<LoaderEntry>,
}

impl ResolvedRequest {
    /// Create a resolved request from a resource and its loaders.
    pub fn new(resource: impl Into<String>, loaders: Vec<LoaderEntry>) -> Self {
        Self {
            resource: resource.into(),
            loaders,
        }
    }

    /// Split an inline-loader request (`!!a?x!b!resource`) the way a host
    /// resolver does: the last segment is the resource, the rest are loaders
    /// with optional `?options`.
    pub fn from_inline_request(request: &str) -> Self {
        let request = request
            .strip_prefix("-!")
            .or_else(|| request.strip_prefix("!!"))
            .or_else(|| request.strip_prefix('!'))
            .unwrap_or(request);

        let mut segments: Vec<&str> = request.split('!').collect();
        let resource = segments.pop().unwrap_or_default();
        let loaders = segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|segment| match segment.split_once('?') {
                Some((loader, options)) => LoaderEntry::new(loader, options),
                None => LoaderEntry::new(segment, ""),
            })
            .collect();

        Self::new(resource, loaders)
    }
}

/// Hooks that turn directory imports into generated index modules.
#[derive(Clone)]
pub struct DirectoryIndexPlugin {
    config: Arc<IndexConfig>,
    file_system: Arc<dyn FileSystem>,
}

impl DirectoryIndexPlugin {
    /// Name to register the hooks under.
    pub const NAME: &'static str = "DirectoryIndexPlugin";

    /// Create a plugin that indexes through the given filesystem handle.
    pub fn new(config: IndexConfig, file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            config: Arc::new(config),
            file_system,
        }
    }

    /// Get the shared configuration.
    pub fn config(&self) -> &Arc<IndexConfig> {
        &self.config
    }

    /// Rewrite a directory import into a generator request.
    ///
    /// `context` is the directory of the importing module. Returns `None`
    /// when the request is not a directory import for this namespace and
    /// must pass through untouched.
    pub fn before_resolve(&self, request: &str, context: &Path) -> Result<Option<String>> {
        let Some((path, query)) = query::split_request(request) else {
            return Ok(None);
        };

        let mut options = query::decode(query)?;
        if !self.config.is_own_namespace(options.get(self.config.keyword())) {
            return Ok(None);
        }

        let abs_path = Path::new(path).absolutize_from(context)?;
        options.insert(
            "path".to_string(),
            Value::String(abs_path.to_string_lossy().into_owned()),
        );

        let rewritten = format!(
            "!!{LOADER}?{}!{PASS_THROUGH_RESOURCE}",
            query::encode(&options)?
        );
        debug!("Rewrote directory import {request} -> {rewritten}");
        Ok(Some(rewritten))
    }

    /// Inject the indexing context into a resolved generator request.
    pub fn after_resolve(&self, data: &mut ResolvedRequest) -> Result<()> {
        if data.resource != PASS_THROUGH_RESOURCE {
            return Ok(());
        }

        let Some(entry) = data.loaders.iter_mut().find(|l| l.loader == LOADER) else {
            if self.config.suppress_removed_error() {
                warn!("Generator loader missing from {}, ignoring", data.resource);
                return Ok(());
            }
            return Err(IndexError::LoaderRemoved {
                resource: data.resource.clone(),
            });
        };

        let raw = match &entry.options {
            LoaderOptions::Query(raw) => raw.clone(),
            LoaderOptions::Context(_) => {
                debug!("Loader context already injected, skipping");
                return Ok(());
            }
        };

        let mut options = query::decode(&raw)?;
        if !self.config.is_own_namespace(options.get(self.config.keyword())) {
            debug!("Loader belongs to another namespace, passing through");
            return Ok(());
        }
        options.shift_remove(self.config.keyword());

        let (root, path) = root_and_path(&options)?;
        debug!("Indexing {path} under {}", root.display());

        entry.ident = Some(raw);
        entry.options = LoaderOptions::Context(IndexingContext {
            root,
            path,
            file_system: self.file_system.clone(),
            config: self.config.clone(),
        });
        Ok(())
    }

    /// Run the generator for a request prepared by [`Self::after_resolve`].
    ///
    /// Returns `None` when the request carries no indexing context.
    pub async fn load(&self, data: &ResolvedRequest) -> Result<Option<GeneratedModule>> {
        let Some(ctx) = data.loaders.iter().find_map(LoaderEntry::context) else {
            return Ok(None);
        };
        generate(ctx).await.map(Some)
    }
}

impl std::fmt::Debug for DirectoryIndexPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(Self::NAME)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Work out the indexing root and the directory relative to it. A request
/// without `root` starts a new top-level index at `path`.
fn root_and_path(options: &OptionSet) -> Result<(PathBuf, String)> {
    let path = string_option(options, "path")?.ok_or_else(|| IndexError::InvalidOption {
        key: "path".to_string(),
        message: "missing".to_string(),
    })?;

    let Some(root) = string_option(options, "root")? else {
        return Ok((PathBuf::from(path), ".".to_string()));
    };

    let relative =
        pathdiff::diff_paths(path, root).ok_or_else(|| IndexError::InvalidOption {
            key: "path".to_string(),
            message: format!("{path} is not relative to {root}"),
        })?;
    let relative = relative.to_string_lossy();
    let relative = if relative.is_empty() {
        ".".to_string()
    } else {
        relative.into_owned()
    };

    Ok((PathBuf::from(root), relative))
}

fn string_option<'a>(options: &'a OptionSet, key: &str) -> Result<Option<&'a str>> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(IndexError::InvalidOption {
            key: key.to_string(),
            message: format!("expected a string, got {other}"),
        }),
    }
}
