//! Synthetic module generation for an indexed directory.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use indexmap::IndexMap;
use path_absolutize::Absolutize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::entry::{Entry, EntryKind};
use crate::error::{IndexError, Result};
use crate::fs::FileSystem;
use crate::query::{self, OptionSet};

/// Everything the generator needs to index one directory.
///
/// Built per request by the interceptor and consumed once.
#[derive(Clone)]
pub struct IndexingContext {
    /// Absolute path of the top-level indexed directory.
    pub root: PathBuf,

    /// Directory to index, relative to `root` (`.` for the root itself).
    pub path: String,

    /// Filesystem handle supplied by the host.
    pub file_system: Arc<dyn FileSystem>,

    /// Active configuration.
    pub config: Arc<IndexConfig>,
}

impl IndexingContext {
    /// Context for indexing `root` itself.
    pub fn new(
        root: impl Into<PathBuf>,
        file_system: Arc<dyn FileSystem>,
        config: Arc<IndexConfig>,
    ) -> Self {
        Self {
            root: root.into(),
            path: ".".to_string(),
            file_system,
            config,
        }
    }

    /// Index a directory below the root instead.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Absolute, normalized path of the directory being indexed.
    pub fn dir_path(&self) -> Result<PathBuf> {
        Ok(Path::new(&self.path)
            .absolutize_from(&self.root)?
            .into_owned())
    }

    /// Request that re-enters the interceptor for a nested directory.
    fn directory_request(&self, abs_path: &Path) -> Result<String> {
        let mut options = OptionSet::new();
        options.insert(
            self.config.keyword().to_string(),
            self.config.namespace().clone(),
        );
        options.insert(
            "root".to_string(),
            Value::String(self.root.to_string_lossy().into_owned()),
        );
        Ok(format!(
            "{}?{}",
            abs_path.display(),
            query::encode(&options)?
        ))
    }
}

impl std::fmt::Debug for IndexingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingContext")
            .field("root", &self.root)
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A namespace import of one child module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Local and exported identifier.
    pub name: String,

    /// Request the child is imported from.
    pub request: String,
}

/// The synthetic module generated for a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// Directory whose listing this module depends on.
    pub context_dependency: PathBuf,

    /// Import bindings, in directory order.
    pub bindings: Vec<ImportBinding>,

    /// Child requests registered for hot reload.
    pub dependencies: Vec<String>,
}

impl GeneratedModule {
    /// Exported identifiers, in binding order.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    /// Render the module as ECMAScript source.
    pub fn render(&self) -> String {
        let mut source = String::new();

        for binding in &self.bindings {
            let _ = writeln!(
                source,
                "import * as {} from {};",
                binding.name,
                string_literal(&binding.request)
            );
        }

        if !self.bindings.is_empty() {
            let names: Vec<&str> = self.exports().collect();
            let _ = writeln!(source, "export {{ {} }};", names.join(", "));
        }

        let accepted: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| string_literal(dep))
            .collect();
        source.push_str("if (module.hot) {\n");
        let _ = writeln!(source, "  module.hot.accept([{}]);", accepted.join(", "));
        source.push_str("}\n");

        source
    }
}

fn string_literal(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Index the context's directory and build its synthetic module.
///
/// Children are stat'ed concurrently; any filesystem error aborts the whole
/// directory. Entries that are neither files nor directories are skipped.
pub async fn generate(ctx: &IndexingContext) -> Result<GeneratedModule> {
    let start = Instant::now();
    let dir = ctx.dir_path()?;

    let names = ctx.file_system.read_dir(&dir).await?;
    let entry_count = names.len();
    let stats = try_join_all(names.iter().map(|name| {
        let path = dir.join(name);
        let file_system = ctx.file_system.clone();
        async move { file_system.stat(&path).await }
    }))
    .await?;

    let mut keys: IndexMap<String, String> = IndexMap::new();
    let mut bindings = Vec::new();
    let mut dependencies = Vec::new();

    for (basename, stat) in names.into_iter().zip(stats) {
        let kind = match stat.kind() {
            kind @ (EntryKind::File | EntryKind::Directory) => kind,
            other => {
                debug!("Skipping {other} entry: {basename}");
                continue;
            }
        };

        let entry = Entry::new(&ctx.root, &ctx.path, basename, kind);
        let Some(name) = ctx.config.resolve_name(&entry)? else {
            continue;
        };

        if let Some(existing) = keys.get(&name) {
            return Err(IndexError::NamingConflict {
                name,
                path: entry.path,
                existing: existing.clone(),
            });
        }

        let request = match kind {
            EntryKind::Directory => ctx.directory_request(&entry.abs_path)?,
            _ => entry.abs_path.display().to_string(),
        };
        debug!("Exporting {} as '{name}'", entry.path);

        keys.insert(name.clone(), entry.path);
        dependencies.push(request.clone());
        bindings.push(ImportBinding { name, request });
    }

    info!(
        "Indexed {} in {:?} ({} entries, {} exports)",
        dir.display(),
        start.elapsed(),
        entry_count,
        bindings.len()
    );

    Ok(GeneratedModule {
        context_dependency: dir,
        bindings,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileStat, MemoryFileSystem, OsFileSystem};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::io;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    /// Lists `a.js` and `b.js`, but refuses to stat `b.js`.
    struct DeniedStatFileSystem;

    #[async_trait]
    impl FileSystem for DeniedStatFileSystem {
        async fn read_dir(&self, _path: &Path) -> io::Result<Vec<String>> {
            Ok(vec!["a.js".to_string(), "b.js".to_string()])
        }

        async fn stat(&self, path: &Path) -> io::Result<FileStat> {
            if path.ends_with("b.js") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "EACCES"))
            } else {
                Ok(FileStat::new(EntryKind::File))
            }
        }
    }

    fn memory_context(fs: MemoryFileSystem, root: &str) -> IndexingContext {
        let config = IndexConfig::builder().build().unwrap();
        IndexingContext::new(root, Arc::new(fs), Arc::new(config))
    }

    #[tokio::test]
    async fn test_generate_files_and_directories() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/src/a.js");
        fs.add_file("/proj/src/b.ts");
        fs.add_file("/proj/src/nested/c.js");

        let module = generate(&memory_context(fs, "/proj/src")).await.unwrap();

        assert_eq!(module.context_dependency, Path::new("/proj/src"));
        assert_eq!(module.exports().collect::<Vec<_>>(), vec!["a", "b", "nested"]);
        assert_eq!(module.bindings[0].request, "/proj/src/a.js");
        assert_eq!(
            module.bindings[2].request,
            "/proj/src/nested?recursive&root=%2Fproj%2Fsrc"
        );
        assert_eq!(
            module.dependencies,
            vec![
                "/proj/src/a.js",
                "/proj/src/b.ts",
                "/proj/src/nested?recursive&root=%2Fproj%2Fsrc",
            ]
        );
    }

    #[tokio::test]
    async fn test_render() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/a.js");
        fs.add_dir("/p/sub");

        let source = generate(&memory_context(fs, "/p")).await.unwrap().render();

        assert_eq!(
            source,
            "import * as a from \"/p/a.js\";\n\
             import * as sub from \"/p/sub?recursive&root=%2Fp\";\n\
             export { a, sub };\n\
             if (module.hot) {\n  \
             module.hot.accept([\"/p/a.js\", \"/p/sub?recursive&root=%2Fp\"]);\n\
             }\n"
        );
    }

    #[tokio::test]
    async fn test_empty_directory_still_registers_hot_reload() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/p/empty");

        let ctx = memory_context(fs, "/p").with_path("empty");
        let module = generate(&ctx).await.unwrap();

        assert!(module.bindings.is_empty());
        assert_eq!(
            module.render(),
            "if (module.hot) {\n  module.hot.accept([]);\n}\n"
        );
    }

    #[tokio::test]
    async fn test_naming_conflict() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/a.css");
        fs.add_file("/p/a.js");

        let err = generate(&memory_context(fs, "/p")).await.unwrap_err();

        match err {
            IndexError::NamingConflict {
                name,
                path,
                existing,
            } => {
                assert_eq!(name, "a");
                assert_eq!(path, "a.js");
                assert_eq!(existing, "a.css");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_identifier_aborts() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/.env");

        let err = generate(&memory_context(fs, "/p")).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidIdentifier { ref name, .. } if name == ".env"));
    }

    #[tokio::test]
    async fn test_other_entries_are_skipped() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/a.js");
        fs.add("/p/socket", EntryKind::Other);

        let module = generate(&memory_context(fs, "/p")).await.unwrap();
        assert_eq!(module.exports().collect::<Vec<_>>(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_nested_paths_are_relative_to_root() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/lib/util/x.js");
        fs.add_file("/p/lib/util/x.spec.js");

        let config = IndexConfig::builder()
            .exclude("/lib/**/*.spec.js")
            .build()
            .unwrap();
        let ctx = IndexingContext::new("/p", Arc::new(fs), Arc::new(config)).with_path("lib/util");

        let module = generate(&ctx).await.unwrap();
        assert_eq!(module.context_dependency, Path::new("/p/lib/util"));
        assert_eq!(module.exports().collect::<Vec<_>>(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_missing_directory_propagates_io_error() {
        let ctx = memory_context(MemoryFileSystem::new(), "/nowhere");

        let err = generate(&ctx).await.unwrap_err();
        assert!(matches!(err, IndexError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_failed_stat_aborts_whole_directory() {
        let config = IndexConfig::builder().build().unwrap();
        let ctx = IndexingContext::new("/p", Arc::new(DeniedStatFileSystem), Arc::new(config));

        let result = generate(&ctx).await;
        assert!(
            matches!(result, Err(IndexError::Io(ref e)) if e.kind() == io::ErrorKind::PermissionDenied),
            "expected permission error, got {result:?}"
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn test_logs_entry_and_export_counts() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/p/a.js");
        fs.add_file("/p/b.css");
        fs.add("/p/socket", EntryKind::Other);

        let config = IndexConfig::builder().include("**/*.js").build().unwrap();
        let ctx = IndexingContext::new("/p", Arc::new(fs), Arc::new(config));
        generate(&ctx).await.unwrap();

        assert!(logs_contain("(3 entries, 1 exports)"));
    }

    #[tokio::test]
    async fn test_generate_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("alpha.js")).unwrap();
        File::create(temp_dir.path().join("beta.json")).unwrap();
        std::fs::create_dir(temp_dir.path().join("gamma")).unwrap();

        let config = IndexConfig::builder().build().unwrap();
        let ctx = IndexingContext::new(temp_dir.path(), Arc::new(OsFileSystem), Arc::new(config));

        let module = generate(&ctx).await.unwrap();
        assert_eq!(
            module.exports().collect::<Vec<_>>(),
            vec!["alpha", "beta", "gamma"]
        );
        assert!(module.bindings[2].request.contains("?recursive&root="));
    }
}
