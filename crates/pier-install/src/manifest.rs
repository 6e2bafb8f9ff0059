//! `package.json` as the resolver sees it.
//!
//! Only the fields the entry-point protocol reads are modeled; everything
//! else in the manifest is ignored. Export maps follow the simplified
//! four-condition lookup (`browser → import → default → require`) with one
//! level of nesting.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::{InstallError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub exports: Option<Value>,

    /// Non-standard but widespread: an ESM entry known to be browser-safe.
    #[serde(default, rename = "browser:module")]
    pub browser_module: Option<String>,

    #[serde(default)]
    pub module: Option<String>,

    #[serde(default, rename = "main:esnext")]
    pub main_esnext: Option<String>,

    /// Either a replacement entry (string) or a file-substitution map.
    #[serde(default)]
    pub browser: Option<Value>,

    #[serde(default)]
    pub main: Option<String>,

    #[serde(default)]
    pub types: Option<String>,

    #[serde(default)]
    pub typings: Option<String>,
}

impl PackageManifest {
    pub fn load(package_dir: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(package_dir.join("package.json"))?;
        serde_json::from_str(&raw).map_err(|e| InstallError::Engine {
            message: format!("malformed package.json: {e}"),
            file: Some(
                package_dir
                    .join("package.json")
                    .to_string_lossy()
                    .replace('\\', "/"),
            ),
        })
    }

    /// Select the package's ESM-preferring entry field.
    ///
    /// Priority: `browser:module`, `module`, `main:esnext`, `browser`
    /// (string form, or object form probed by key), `main`.
    pub fn select_entry(&self, specifier: &str) -> Option<String> {
        if let Some(entry) = &self.browser_module {
            return Some(entry.clone());
        }
        if let Some(entry) = &self.module {
            return Some(entry.clone());
        }
        if let Some(entry) = &self.main_esnext {
            return Some(entry.clone());
        }
        if let Some(entry) = self.browser_entry(specifier) {
            return Some(entry);
        }
        self.main.clone()
    }

    fn browser_entry(&self, specifier: &str) -> Option<String> {
        match self.browser.as_ref()? {
            Value::String(entry) => Some(entry.clone()),
            Value::Object(map) => [specifier, "./index.js", "./index", "./", "."]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string)),
            _ => None,
        }
    }

    /// True when the package ships types and nothing runnable.
    pub fn types_only(&self) -> bool {
        self.types.is_some() || self.typings.is_some()
    }

    /// Resolve a subpath through the `exports` map.
    ///
    /// Returns `Ok(None)` when the map has no entry for the subpath (the
    /// cascade falls through); a present entry that yields no string is a
    /// hard error.
    pub fn resolve_export(&self, package: &str, subpath: &str) -> Result<Option<String>> {
        let Some(Value::Object(exports)) = &self.exports else {
            return Ok(None);
        };
        let key = format!("./{subpath}");
        let Some(entry) = exports.get(&key) else {
            return Ok(None);
        };

        resolve_export_conditions(entry)
            .map(Some)
            .ok_or_else(|| InstallError::ExportMapMismatch {
                package: package.to_string(),
                subpath: subpath.to_string(),
            })
    }
}

/// Condition lookup order for export-map entries.
const EXPORT_CONDITIONS: [&str; 4] = ["browser", "import", "default", "require"];

fn resolve_export_conditions(entry: &Value) -> Option<String> {
    match entry {
        Value::String(path) => Some(path.clone()),
        Value::Object(conditions) => EXPORT_CONDITIONS.iter().find_map(|condition| {
            conditions
                .get(*condition)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        }),
        _ => None,
    }
}
