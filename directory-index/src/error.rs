//! Error types for directory indexing.

use thiserror::Error;

/// Result type alias for indexing operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while intercepting or generating directory modules.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Invalid plugin configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An option value that cannot be written into a query string.
    #[error("unsupported query string value for '{key}': {value}")]
    UnsupportedValue {
        key: String,
        value: serde_json::Value,
    },

    /// An entry type the naming function does not know how to handle.
    #[error("unsupported entry type: {0}")]
    UnsupportedEntryType(String),

    /// A derived export name is not a valid identifier.
    #[error(
        "Invalid name '{name}'. {reason}. To resolve, please specify a custom get_name function."
    )]
    InvalidIdentifier { name: String, reason: &'static str },

    /// Two directory entries resolved to the same export name.
    #[error("Naming conflict for name '{name}':\n{path}\n{existing}")]
    NamingConflict {
        name: String,
        path: String,
        existing: String,
    },

    /// The generator loader vanished from a pass-through request.
    #[error(
        "Requested '{resource}', but loader is missing! Maybe the loader was removed by another plugin? If you meant to remove it, set suppress_removed_error to suppress this error."
    )]
    LoaderRemoved { resource: String },

    /// Invalid include/exclude pattern.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A decoded loader option has an unexpected shape.
    #[error("invalid loader option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// Malformed percent-encoding in a query string.
    #[error("query string decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
}
