//! Pre-run configuration validation.
//!
//! Fatal problems become `ConfigError`; findings the caller should surface
//! but which do not change install behavior come back as `ConfigWarning`.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::config::PierConfig;
use crate::error::{ConfigError, Result};

/// Non-fatal validation findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The destination directory sits inside a mounted source directory.
    /// It is still removed wholesale on every run; embedders should surface
    /// this prominently.
    DestructiveDest(PathBuf),
}

/// Validate a configuration against a project root.
///
/// Checks, in order:
/// 1. at least one mount is declared and every mount directory exists
/// 2. a `node_modules` directory is reachable from the project root, unless
///    the run is fully remote (`webDependencies` declared)
/// 3. destination placement (warning only)
pub fn validate(config: &PierConfig, project_root: &Path) -> Result<Vec<ConfigWarning>> {
    if config.mount.is_empty() {
        return Err(ConfigError::EmptyMount);
    }

    for dir in config.mount.keys() {
        let abs = absolutize(project_root, dir);
        if !abs.is_dir() {
            return Err(ConfigError::MountNotFound(abs));
        }
    }

    if config.web_dependencies.is_empty() && find_node_modules(project_root).is_none() {
        return Err(ConfigError::MissingNodeModules(project_root.to_path_buf()));
    }

    let mut warnings = Vec::new();
    let dest = absolutize(project_root, &config.install_options.dest);
    for dir in config.mount.keys() {
        let mount = absolutize(project_root, dir);
        if dest.starts_with(&mount) {
            warnings.push(ConfigWarning::DestructiveDest(dest.clone()));
            break;
        }
    }

    Ok(warnings)
}

/// Walk upward from `start` looking for a `node_modules` directory.
pub fn find_node_modules(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join("node_modules"))
        .find(|candidate| candidate.is_dir())
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        root.join(path).clean()
    }
}
