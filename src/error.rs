//! Error types for level configuration, query dispatch and output formatting.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by `Resolver::resolve_relations`.
#[derive(Debug, Error)]
pub enum RelateError {
    /// An identifier classified to, or a request named, a level absent from the registry.
    #[error("Unknown level: {level}")]
    UnknownLevel { level: String },

    /// Relation mode text did not name a supported mode.
    #[error("Unknown relation mode: {mode}")]
    UnknownMode { mode: String },

    /// Distance mode without a usable radius.
    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("Spatial store error: {0}")]
    Store(#[from] StoreError),

    #[error("Formatting error: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RelateError {
    pub fn unknown_level(level: impl Into<String>) -> Self {
        RelateError::UnknownLevel {
            level: level.into(),
        }
    }

    /// Short machine-readable kind, for callers that map errors to responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RelateError::UnknownLevel { .. } => "unknown_level",
            RelateError::UnknownMode { .. } => "unknown_mode",
            RelateError::InvalidRange { .. } => "invalid_range",
            RelateError::Store(_) => "store_error",
            RelateError::Format(_) => "format_error",
            RelateError::Config(_) => "config_error",
        }
    }
}

/// Failures from a spatial store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),

    #[error("Failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid dataset {path}: {reason}")]
    Dataset { path: PathBuf, reason: String },

    #[error("Unsupported by this store: {0}")]
    Unsupported(String),
}

/// Level configuration rejected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Level '{0}' is configured more than once")]
    DuplicateLevel(String),

    #[error("Level '{level}' names unknown parent '{parent}'")]
    UnknownParent { level: String, parent: String },

    #[error("Level '{level}' has parent '{parent}' which is not a shape level")]
    ParentNotShape { level: String, parent: String },

    #[error("Level '{0}' is its own ancestor")]
    ParentCycle(String),

    #[error("Point level '{0}' must declare an srid")]
    MissingSrid(String),

    #[error("{context} references unknown level '{level}'")]
    UnknownLevel { context: String, level: String },

    #[error("Classifier must supply exactly one of a prefix-code table or a max-length table")]
    ClassifierStrategy,

    #[error("Classifier code '{code}' does not have the configured prefix length {length}")]
    ClassifierCode { code: String, length: usize },

    #[error("Shortcut for '{source_level}' is invalid: {reason}")]
    InvalidShortcut { source_level: String, reason: String },
}

/// Failures while serializing a topology payload.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Row '{0}' has no geometry to serialize")]
    MissingGeometry(String),

    #[error("Row '{id}' has an unreadable geometry: {reason}")]
    InvalidGeometry { id: String, reason: String },

    #[error("Invalid quantization {0}: must be at least 2")]
    InvalidQuantization(f64),

    #[error("Invalid precision {0}: at most 15 decimal places are meaningful")]
    InvalidPrecision(u32),
}

pub type Result<T, E = RelateError> = std::result::Result<T, E>;
