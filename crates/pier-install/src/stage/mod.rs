//! The transformation stage chain.
//!
//! Every pipeline stage is a variant of [`Stage`]; the engine composes them
//! by ordered iteration over three hooks (resolve, load, transform), the
//! same shape a rollup-style plugin chain exposes. Built-in stages are data,
//! not trait objects; user-declared stages are opaque names the embedding
//! application dispatches on.

mod cjs;
mod css;
mod env;
mod fetch;
mod json;
mod wrapper;

pub use cjs::{detect_named_exports, is_commonjs, wrap_commonjs};
pub use css::css_to_module;
pub use env::EnvReplacements;
pub use fetch::rewrite_fetch;
pub use json::json_to_module;
pub use wrapper::{facade_module, WELL_KNOWN_NAMED_EXPORTS};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::alias::{apply_alias, find_alias, AliasEntry, AliasKind};
use crate::{InstallError, Result};

/// Environment variable naming CommonJS-looking ids that must be treated as
/// ES modules (comma-separated).
pub const EXTERNAL_ESM_VAR: &str = "PIER_EXTERNAL_ESM";

/// One module moving through the chain.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Module id as the graph sees it (absolute path, or a virtual id for
    /// synthesized facades).
    pub id: String,
    pub path: PathBuf,
    pub source: String,
}

impl ModuleRecord {
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }
}

/// Where a module's bytes came from, for the stats report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    Disk,
    RemoteCache,
    Synthesized,
}

/// Mutable state threaded through the chain for one run.
#[derive(Debug, Default)]
pub struct StageContext {
    /// Post-transform sizes and origins, keyed by module id.
    pub sizes: FxHashMap<String, (usize, ModuleOrigin)>,
    /// Ids nothing in the chain could resolve, with their importer.
    pub unresolved: Vec<(String, String)>,
}

/// Local cache of remote-dependency artifacts.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    pub dir: PathBuf,
    pub keys: FxHashSet<String>,
}

#[derive(Debug, Clone)]
pub struct CjsOptions {
    /// Ids exempt from CommonJS wrapping.
    pub external_esm: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WrapperOptions {
    /// Packages whose named-import convention is known.
    pub known_named: FxHashSet<String>,
}

/// A pipeline stage. Order in the chain is fixed by [`build_chain`].
#[derive(Debug, Clone)]
pub enum Stage {
    EnvReplace(EnvReplacements),
    RemoteCache(RemoteCache),
    Alias(Vec<AliasEntry>),
    FetchRewrite(FxHashMap<String, String>),
    Json,
    Css,
    CommonJs(CjsOptions),
    EntryWrapper(WrapperOptions),
    Stats,
    User(String),
    UnresolvedCatcher,
}

impl Stage {
    /// Resolve hook: map an import specifier to a new id, or `None` to pass.
    pub fn resolve(&self, id: &str, _importer: &str) -> Option<String> {
        match self {
            Stage::Alias(entries) => {
                let entry = find_alias(entries, id)?;
                (entry.kind == AliasKind::Package).then(|| apply_alias(entry, id))
            }
            Stage::RemoteCache(cache) if cache.keys.contains(id) => {
                Some(cache.dir.join(format!("{id}.js")).to_string_lossy().into_owned())
            }
            _ => None,
        }
    }

    /// Load hook: produce source for an id nothing on disk serves.
    pub fn load(&self, id: &str) -> Option<(String, ModuleOrigin)> {
        match self {
            Stage::RemoteCache(cache) => {
                let path = Path::new(id);
                if path.starts_with(&cache.dir) {
                    std::fs::read_to_string(path)
                        .ok()
                        .map(|source| (source, ModuleOrigin::RemoteCache))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Transform hook: rewrite a loaded module in place.
    pub fn transform(&self, module: &mut ModuleRecord, cx: &mut StageContext) -> Result<()> {
        match self {
            Stage::EnvReplace(replacements) => {
                module.source = replacements.apply(&module.source);
            }
            Stage::FetchRewrite(asset_urls) => {
                module.source = rewrite_fetch(&module.source, asset_urls);
            }
            Stage::Json if module.extension() == "json" => {
                module.source =
                    json_to_module(&module.source).map_err(|e| InstallError::Engine {
                        message: e,
                        file: Some(forward_slashes(&module.path)),
                    })?;
            }
            Stage::Css if module.extension() == "css" => {
                module.source = css_to_module(&module.source);
            }
            Stage::CommonJs(options) => {
                let exempt = options.external_esm.iter().any(|id| module.id.contains(id.as_str()));
                if !exempt
                    && matches!(module.extension(), "js" | "cjs")
                    && is_commonjs(&module.source)
                {
                    module.source = wrap_commonjs(&module.source);
                }
            }
            Stage::Stats => {
                // Keeps a previously recorded origin (remote cache) intact.
                cx.sizes
                    .entry(module.id.clone())
                    .or_insert((0, ModuleOrigin::Disk))
                    .0 = module.source.len();
            }
            // User stages are dispatched by the embedding application; the
            // core carries them through the chain untouched.
            _ => {}
        }
        Ok(())
    }
}

/// Everything the chain builder needs from the configuration.
pub struct ChainInputs<'a> {
    pub env: &'a BTreeMap<String, Value>,
    pub aliases: Vec<AliasEntry>,
    pub remote: Option<RemoteCache>,
    pub asset_urls: FxHashMap<String, String>,
    pub extra_named_exports: &'a [String],
    pub user_stages: &'a [String],
}

/// Assemble the chain in its fixed order.
pub fn build_chain(inputs: ChainInputs<'_>) -> Vec<Stage> {
    let mut chain = Vec::new();

    chain.push(Stage::EnvReplace(EnvReplacements::from_config(inputs.env)));
    if let Some(remote) = inputs.remote {
        chain.push(Stage::RemoteCache(remote));
    }
    chain.push(Stage::Alias(inputs.aliases));
    chain.push(Stage::FetchRewrite(inputs.asset_urls));
    chain.push(Stage::Json);
    chain.push(Stage::Css);
    chain.push(Stage::CommonJs(CjsOptions {
        external_esm: std::env::var(EXTERNAL_ESM_VAR)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default(),
    }));

    let mut known_named: FxHashSet<String> = WELL_KNOWN_NAMED_EXPORTS
        .iter()
        .map(|s| s.to_string())
        .collect();
    known_named.extend(inputs.extra_named_exports.iter().cloned());
    chain.push(Stage::EntryWrapper(WrapperOptions { known_named }));

    chain.push(Stage::Stats);
    chain.extend(inputs.user_stages.iter().cloned().map(Stage::User));
    chain.push(Stage::UnresolvedCatcher);

    chain
}

pub(crate) fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_order_is_fixed() {
        let env = BTreeMap::new();
        let chain = build_chain(ChainInputs {
            env: &env,
            aliases: Vec::new(),
            remote: Some(RemoteCache {
                dir: PathBuf::from("/cache"),
                keys: FxHashSet::default(),
            }),
            asset_urls: FxHashMap::default(),
            extra_named_exports: &[],
            user_stages: &["tailwind".to_string()],
        });

        let shape: Vec<&'static str> = chain
            .iter()
            .map(|s| match s {
                Stage::EnvReplace(_) => "env",
                Stage::RemoteCache(_) => "remote",
                Stage::Alias(_) => "alias",
                Stage::FetchRewrite(_) => "fetch",
                Stage::Json => "json",
                Stage::Css => "css",
                Stage::CommonJs(_) => "cjs",
                Stage::EntryWrapper(_) => "wrapper",
                Stage::Stats => "stats",
                Stage::User(_) => "user",
                Stage::UnresolvedCatcher => "catcher",
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                "env", "remote", "alias", "fetch", "json", "css", "cjs", "wrapper", "stats",
                "user", "catcher"
            ]
        );
    }

    #[test]
    fn remote_stage_absent_without_manifest() {
        let env = BTreeMap::new();
        let chain = build_chain(ChainInputs {
            env: &env,
            aliases: Vec::new(),
            remote: None,
            asset_urls: FxHashMap::default(),
            extra_named_exports: &[],
            user_stages: &[],
        });
        assert!(!chain.iter().any(|s| matches!(s, Stage::RemoteCache(_))));
    }
}
