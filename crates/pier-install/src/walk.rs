//! Mount-root file enumeration.
//!
//! Walks every mounted directory, applies the exclusion globs, and yields an
//! ordered, deduplicated list of candidate source files. The output
//! namespace (`web_modules/`) and hidden paths are never scanned.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use path_clean::PathClean;
use rustc_hash::FxHashSet;
use walkdir::WalkDir;

use crate::{InstallError, Result};

/// Directory name the installer emits into; enumeration must never read it
/// back as input.
pub const OUTPUT_SEGMENT: &str = "web_modules";

/// Compiled exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn compile(globs: &[String]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g).map_err(|e| {
                    InstallError::Config(pier_config::ConfigError::InvalidValue {
                        field: "exclude".to_string(),
                        hint: Some(format!("bad glob \"{g}\": {e}")),
                    })
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &Path) -> bool {
        // Globs are written with forward slashes; normalize before matching.
        let unix = path.to_string_lossy().replace('\\', "/");
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(&unix, options))
    }
}

/// Enumerate candidate files across mount roots.
///
/// Mount roots are visited in the order given. Within a root, traversal is
/// sorted so output ordering is stable across file systems. Files seen under
/// more than one root are kept at their first position.
pub fn enumerate_files(
    mounts: impl IntoIterator<Item = PathBuf>,
    exclude: &ExcludeSet,
) -> Vec<PathBuf> {
    let mut seen = FxHashSet::default();
    let mut files = Vec::new();

    for root in mounts {
        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir_component(e.file_name().to_string_lossy().as_ref()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("skipping unreadable path during enumeration: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf().clean();
            if exclude.matches(&path) {
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    files
}

/// Hidden directories and the output namespace are pruned during traversal.
/// Applies to files too: a dot-prefixed file is never a candidate.
fn is_skipped_dir_component(name: &str) -> bool {
    (name.starts_with('.') && name.len() > 1) || name == OUTPUT_SEGMENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn skips_hidden_and_output_paths() {
        let tmp = TempDir::new().unwrap();
        let kept = touch(tmp.path(), "src/index.js");
        touch(tmp.path(), "src/.cache/module.js");
        touch(tmp.path(), "src/.DS_Store");
        touch(tmp.path(), "src/web_modules/react.js");

        let files = enumerate_files([tmp.path().join("src")], &ExcludeSet::default());
        assert_eq!(files, vec![kept.clean()]);
    }

    #[test]
    fn exclusion_globs_apply() {
        let tmp = TempDir::new().unwrap();
        let kept = touch(tmp.path(), "src/app.js");
        touch(tmp.path(), "src/app.test.js");

        let exclude = ExcludeSet::compile(&["**/*.test.js".to_string()]).unwrap();
        let files = enumerate_files([tmp.path().join("src")], &exclude);
        assert_eq!(files, vec![kept.clean()]);
    }

    #[test]
    fn union_across_roots_preserves_first_seen_order() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a/one.js");
        let b = touch(tmp.path(), "b/two.js");

        let files = enumerate_files(
            [
                tmp.path().join("a"),
                tmp.path().join("b"),
                tmp.path().join("a"),
            ],
            &ExcludeSet::default(),
        );
        assert_eq!(files, vec![a.clean(), b.clean()]);
    }

    #[test]
    fn bad_glob_is_a_config_error() {
        assert!(ExcludeSet::compile(&["[".to_string()]).is_err());
    }
}
