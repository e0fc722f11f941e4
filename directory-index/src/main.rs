use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use codex_directory_index::query::{self, OptionSet};
use codex_directory_index::{DirectoryIndexPlugin, IndexOptions, OsFileSystem, ResolvedRequest};
use path_absolutize::Absolutize;
use tracing_subscriber::EnvFilter;

/// Print the module generated for a directory import.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory to index.
    dir: PathBuf,

    /// TOML file with indexing options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only export entries matching this glob (repeatable).
    #[arg(long)]
    include: Vec<String>,

    /// Never export entries matching this glob (repeatable).
    #[arg(long)]
    exclude: Vec<String>,

    /// Query keyword marking directory imports.
    #[arg(long)]
    keyword: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut options = match &cli.config {
        Some(path) => IndexOptions::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => IndexOptions::default(),
    };
    options.include.extend(cli.include);
    options.exclude.extend(cli.exclude);
    if let Some(keyword) = cli.keyword {
        options.keyword = keyword;
    }

    let config = options.into_config()?;
    let mut marker = OptionSet::new();
    marker.insert(config.keyword().to_string(), config.namespace().clone());

    // Drive the same hook sequence a bundler would for `import "<dir>?<keyword>"`.
    let cwd = std::env::current_dir()?;
    let dir = cli.dir.absolutize_from(&cwd)?;
    let request = format!("{}?{}", dir.display(), query::encode(&marker)?);
    let plugin = DirectoryIndexPlugin::new(config, Arc::new(OsFileSystem));
    let rewritten = plugin
        .before_resolve(&request, &cwd)?
        .context("directory import was not recognized")?;

    let mut resolved = ResolvedRequest::from_inline_request(&rewritten);
    plugin.after_resolve(&mut resolved)?;
    let module = plugin
        .load(&resolved)
        .await?
        .context("generator loader was not prepared")?;

    print!("{}", module.render());
    Ok(())
}
