//! Compile-time environment substitution.
//!
//! Browser bundles have no `process`; occurrences of the well-known probes
//! are replaced with constants so dead branches can be dropped downstream.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct EnvReplacements {
    /// `(needle, replacement)`, longest needle first so `typeof` forms are
    /// never clobbered by their shorter prefixes.
    pairs: Vec<(String, String)>,
}

impl EnvReplacements {
    pub fn from_config(env: &BTreeMap<String, Value>) -> Self {
        let mut pairs: Vec<(String, String)> = vec![
            ("typeof process.versions.node".into(), "\"undefined\"".into()),
            ("process.versions.node".into(), "undefined".into()),
            ("typeof process".into(), "\"object\"".into()),
            ("process.platform".into(), "\"browser\"".into()),
        ];

        for (name, value) in env {
            pairs.push((format!("process.env.{name}"), replacement_value(name, value)));
        }

        if !env.contains_key("NODE_ENV") {
            let node_env =
                std::env::var("NODE_ENV").unwrap_or_else(|_| "production".to_string());
            pairs.push((
                "process.env.NODE_ENV".into(),
                serde_json::to_string(&node_env).expect("string serializes"),
            ));
        }

        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self { pairs }
    }

    pub fn apply(&self, source: &str) -> String {
        let mut out = source.to_string();
        for (needle, replacement) in &self.pairs {
            if out.contains(needle.as_str()) {
                out = out.replace(needle.as_str(), replacement);
            }
        }
        out
    }
}

/// `true` pulls the host's current value; anything else is embedded as JSON.
fn replacement_value(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(true) => {
            let host = std::env::var(name).unwrap_or_default();
            serde_json::to_string(&host).expect("string serializes")
        }
        other => serde_json::to_string(other).expect("config value serializes"),
    }
}
