//! Output directory lifecycle, import map, and lockfile I/O.
//!
//! The import map and the lockfile share one schema: `{"imports": {...}}`
//! with sorted keys, so two runs over unchanged inputs serialize
//! byte-identically. Writes go through a temp file plus rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{InstallError, Result};

/// File name of the import map inside the output directory.
pub const IMPORT_MAP_FILE: &str = "import-map.json";

/// Default lockfile name at the project root.
pub const LOCKFILE_NAME: &str = "pier.lock.json";

/// Specifier-to-URL mapping, the browser-facing contract of an install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports.get(specifier).map(String::as_str)
    }

    pub fn insert(&mut self, specifier: impl Into<String>, url: impl Into<String>) {
        self.imports.insert(specifier.into(), url.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.imports.iter()
    }

    /// Read a map from disk; a missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| InstallError::Engine {
                message: format!("malformed import map: {e}"),
                file: Some(path.to_string_lossy().replace('\\', "/")),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write atomically: serialize to a temp file beside the target, then
    /// rename into place.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).expect("map serializes");
        let tmp = path.with_extension("json.tmp");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Derive the output name for a specifier.
///
/// Deterministic and free of characters that cannot appear in file names.
/// A trailing `.js`/`.mjs` is dropped (`react.js` installs as `react`,
/// `pkg/lib/file.js` as `pkg/lib/file`) since JS outputs get `.js` appended
/// at emission; asset specifiers keep their extension.
pub fn sanitize_name(specifier: &str) -> String {
    let base = specifier
        .strip_suffix(".js")
        .or_else(|| specifier.strip_suffix(".mjs"))
        .unwrap_or(specifier);

    base.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\\' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// Build the name map for a target set, rejecting sanitization collisions.
pub fn assign_output_names<'a>(
    specifiers: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<String, String>> {
    let mut names: BTreeMap<String, String> = BTreeMap::new();
    let mut reverse: BTreeMap<String, String> = BTreeMap::new();

    for specifier in specifiers {
        let sanitized = sanitize_name(specifier);
        if let Some(previous) = reverse.get(&sanitized) {
            if previous != specifier {
                return Err(InstallError::NameCollision {
                    a: previous.clone(),
                    b: specifier.to_string(),
                    sanitized,
                });
            }
            continue;
        }
        reverse.insert(sanitized.clone(), specifier.to_string());
        names.insert(specifier.to_string(), sanitized);
    }

    Ok(names)
}

/// Remove and recreate the output directory.
///
/// Runs exactly once per invocation, before emission; a failed run leaves
/// the directory absent.
pub fn reset_output_dir(dest: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dest)?;
    Ok(())
}

/// Write one output file under the destination, creating parents.
pub fn write_output_file(dest: &Path, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dest.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    Ok(path)
}
