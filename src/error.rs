//! Application-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while
//! the CLI and `main` use `anyhow` for convenient error propagation.
//!
//! Every variant is fatal to a run: the pipeline never retries and never
//! recovers locally, it hands the error up to `main`, which logs it and
//! exits non-zero.
//!
//! # Example
//!
//! ```ignore
//! use sortie::error::{Error, Result, ResultExt};
//!
//! fn stage(cache: &StagingCache) -> Result<()> {
//!     cache.ensure_dir().with_context("preparing staging directory")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration value, unknown discovery mode,
    /// or a credential profile that does not exist.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The object store rejected a call for lack of authorization.
    #[error("Permission denied: {operation} on '{key}'")]
    PermissionDenied { operation: &'static str, key: String },

    /// Any other object store failure.
    #[error("Object store error during {operation} on '{key}': {message}")]
    Store {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Track list manifest could not be read or parsed.
    #[error("Manifest error for {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Tag reading failed on a staged file.
    #[error("Metadata error for {path}: {message}")]
    MetadataExtraction { path: PathBuf, message: String },

    /// Malformed destination template.
    #[error("Template error: {0}")]
    TemplateRender(String),

    /// The template rendered an empty destination key.
    #[error("Template rendered an empty target path for {0}")]
    EmptyTargetPath(PathBuf),

    /// Staging directory could not be created, walked or purged.
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run plan could not be encoded or decoded.
    #[error("Plan file {path}: {source}")]
    Plan {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Other local I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a metadata extraction error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MetadataExtraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a manifest error.
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::TemplateRender(message.into())
    }

    /// Create a filesystem error tied to a path.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// True when the root cause is an authorization failure.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::WithContext { source, .. } => source.is_permission_denied(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}
