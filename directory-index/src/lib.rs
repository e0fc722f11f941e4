//! # Directory Index
//!
//! Lets a module bundler import a directory as if it were a module. Importing
//! `./components?recursive` yields a synthetic module that namespace-imports
//! every qualifying child and re-exports it under a derived identifier.
//! Subdirectories are imported the same way, so the whole tree is reachable.
//!
//! ## Features
//!
//! - **Name Derivation**: `button.tsx` is exported as `button`, directories keep their name
//! - **Include/Exclude Patterns**: globs, regexes, predicates or lists of them
//! - **Conflict Detection**: two children with the same export name are an error
//! - **Hot Reload**: generated modules accept updates from every child
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Directory Index                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  request ──► DirectoryIndexPlugin ──► IndexingContext           │
//! │                 │                          │                    │
//! │                 ▼                          ▼                    │
//! │            query codec    FileSystem ──► generate ──► module    │
//! │                                            │                    │
//! │                                  Matcher + NameResolver         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod fs;
pub mod generator;
pub mod interceptor;
pub mod naming;
pub mod pattern;
pub mod query;

pub use config::{IndexConfig, IndexConfigBuilder, IndexOptions};
pub use entry::{Entry, EntryKind};
pub use error::{IndexError, Result};
pub use fs::{FileStat, FileSystem, MemoryFileSystem, OsFileSystem};
pub use generator::{GeneratedModule, ImportBinding, IndexingContext, generate};
pub use interceptor::{DirectoryIndexPlugin, LoaderEntry, LoaderOptions, ResolvedRequest};
pub use naming::{default_name, validate_identifier};
pub use pattern::{Matcher, Pattern};
pub use query::OptionSet;
