//! The Pier configuration structure.
//!
//! This mirrors the JSON configuration an embedding application hands to the
//! installer. Everything is optional with sensible defaults; `from_value`
//! exists so callers that already hold a `serde_json::Value` (from a config
//! file, a database, an API) can build a typed config without re-serializing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PierConfig {
    /// Disk directory -> URL prefix. The keys are the roots scanned for
    /// imports; the values are where the dev server would mount them.
    pub mount: BTreeMap<PathBuf, String>,

    /// Glob patterns excluded from the scan.
    pub exclude: Vec<String>,

    /// Specifier rewrites. Values are classified at install time as
    /// package aliases, path aliases, or URL aliases.
    pub alias: BTreeMap<String, String>,

    /// Specifiers to install even if never imported by scanned source.
    pub known_entrypoints: Vec<String>,

    /// Remote dependency manifest. Keys become install targets; artifacts
    /// are served from the local remote cache.
    pub web_dependencies: BTreeMap<String, String>,

    pub install_options: InstallOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallOptions {
    /// Output directory, removed and recreated on every run.
    pub dest: PathBuf,

    /// Environment substitutions. A value of `true` pulls the host's
    /// current value; anything else is JSON-stringified into the output.
    pub env: BTreeMap<String, Value>,

    /// Package prefixes left unbundled for the consumer to resolve.
    pub external_package: Vec<String>,

    pub source_map: bool,

    pub treeshake: bool,

    /// Install `.d.ts` artifacts alongside remote dependencies.
    pub install_types: bool,

    /// Extra CommonJS packages whose named-import convention is known.
    pub named_exports: Vec<String>,

    /// Per-specifier resolution failures become skipped targets instead of
    /// aborting the run.
    pub skip_failures: bool,

    #[serde(rename = "rollup")]
    pub engine: EngineTuning,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("web_modules"),
            env: BTreeMap::new(),
            external_package: Vec::new(),
            source_map: false,
            treeshake: true,
            install_types: false,
            named_exports: Vec::new(),
            skip_failures: false,
            engine: EngineTuning::default(),
        }
    }
}

/// Knobs forwarded to the bundler engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineTuning {
    /// Package ids resolved from the project root even when nested copies
    /// exist deeper in node_modules.
    pub dedupe: Vec<String>,

    /// Names of user-declared stages, applied in declared order. The core
    /// treats these as opaque; the embedding application registers the
    /// matching implementations.
    pub plugins: Vec<String>,
}

impl PierConfig {
    /// Build a typed config from a raw JSON value.
    ///
    /// # Example
    ///
    /// ```
    /// use pier_config::PierConfig;
    /// use serde_json::json;
    ///
    /// let config = PierConfig::from_value(json!({
    ///     "mount": { "src": "/_dist_" },
    ///     "installOptions": { "dest": "web_modules" }
    /// }))
    /// .unwrap();
    /// assert_eq!(config.install_options.dest.to_str(), Some("web_modules"));
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert back to a raw JSON value.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_complete() {
        let config = PierConfig::default();
        assert_eq!(config.install_options.dest, PathBuf::from("web_modules"));
        assert!(config.install_options.treeshake);
        assert!(!config.install_options.source_map);
        assert!(config.mount.is_empty());
    }

    #[test]
    fn camel_case_round_trip() {
        let config = PierConfig::from_value(json!({
            "knownEntrypoints": ["preact/hooks"],
            "webDependencies": { "htm": "^3.0.0" },
            "installOptions": {
                "externalPackage": ["fs"],
                "sourceMap": true,
                "rollup": { "dedupe": ["preact"] }
            }
        }))
        .unwrap();

        assert_eq!(config.known_entrypoints, vec!["preact/hooks"]);
        assert!(config.web_dependencies.contains_key("htm"));
        assert_eq!(config.install_options.external_package, vec!["fs"]);
        assert!(config.install_options.source_map);
        assert_eq!(config.install_options.engine.dedupe, vec!["preact"]);

        let value = config.to_value().unwrap();
        assert_eq!(value["installOptions"]["sourceMap"], json!(true));
    }

    #[test]
    fn unknown_top_level_fields_are_rejected_by_value_hint() {
        // serde is lenient about unknown fields by default; the validation
        // layer is responsible for anything stricter. This just pins the
        // permissive behavior so it does not change by accident.
        let config = PierConfig::from_value(json!({ "scripts": {} })).unwrap();
        assert!(config.mount.is_empty());
    }
}
