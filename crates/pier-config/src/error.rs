//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no node_modules directory found above {0} and no webDependencies declared")]
    MissingNodeModules(PathBuf),

    #[error("mount map is empty; nothing to scan")]
    EmptyMount,

    #[error("mounted directory not found: {0}")]
    MountNotFound(PathBuf),

    #[error("invalid config value for `{field}`: {}", .hint.as_deref().unwrap_or("malformed value"))]
    InvalidValue {
        field: String,
        hint: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
