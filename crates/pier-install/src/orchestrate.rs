//! The install orchestrator.
//!
//! One invocation walks the state machine `Idle → Enumerating → Scanning →
//! Aggregating → Resolving → Bundling → Emitting → Succeeded | Failed`. All
//! run-scoped state lives in an explicit context record; nothing survives
//! between invocations except the lockfile on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use pier_config::{ConfigWarning, PierConfig};
use rustc_hash::FxHashMap;

use crate::aggregate::aggregate_targets;
use crate::alias::build_alias_table;
use crate::emit::{
    assign_output_names, reset_output_dir, write_output_file, ImportMap, IMPORT_MAP_FILE,
    LOCKFILE_NAME,
};
use crate::engine::{BundleRequest, BundlerEngine, EngineWarning, EntryInput};
use crate::linker::FlatLinker;
use crate::load::load_sources;
use crate::resolve::{resolve_specifier, DependencyKind};
use crate::scan::scan_imports;
use crate::stage::{build_chain, ChainInputs, RemoteCache};
use crate::walk::{enumerate_files, ExcludeSet};
use crate::{InstallError, Result};

pub use crate::stats::{DependencyStats, DependencyStatsEntry};

/// Directory under the project root holding pre-fetched remote artifacts.
const REMOTE_CACHE_DIR: &str = ".pier/remote";

/// Input to one install invocation.
pub struct InstallRequest {
    pub config: PierConfig,
    pub project_root: PathBuf,
    /// Bundler engine; the reference linker when unset.
    pub engine: Option<Arc<dyn BundlerEngine>>,
    /// Lockfile location; `<project root>/pier.lock.json` when unset.
    pub lockfile_path: Option<PathBuf>,
}

impl InstallRequest {
    pub fn new(config: PierConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            engine: None,
            lockfile_path: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn BundlerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }
}

/// Terminal surface of one invocation.
#[derive(Debug)]
pub struct InstallResult {
    pub success: bool,
    /// Non-fatal warnings were recorded on an otherwise complete run.
    pub has_error: bool,
    pub import_map: ImportMap,
    pub new_lockfile: Option<ImportMap>,
    pub stats: DependencyStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Enumerating,
    Scanning,
    Aggregating,
    Resolving,
    Bundling,
    Emitting,
    Succeeded,
    Failed,
}

/// Run-scoped state threaded through the pipeline.
struct RunContext {
    state: RunState,
    has_warning: bool,
    circular_seen: bool,
}

impl RunContext {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            has_warning: false,
            circular_seen: false,
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!("install state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn warn(&mut self, message: impl std::fmt::Display) {
        tracing::warn!("{message}");
        self.has_warning = true;
    }
}

/// Run one install invocation end to end.
pub async fn install(request: InstallRequest) -> Result<InstallResult> {
    let mut run = RunContext::new();
    match install_inner(request, &mut run).await {
        Ok(result) => {
            run.advance(RunState::Succeeded);
            Ok(result)
        }
        Err(error) => {
            run.advance(RunState::Failed);
            Err(error)
        }
    }
}

async fn install_inner(request: InstallRequest, run: &mut RunContext) -> Result<InstallResult> {
    let InstallRequest {
        config,
        project_root,
        engine,
        lockfile_path,
    } = request;
    let project_root = absolutize(&project_root)?;

    for warning in pier_config::validate(&config, &project_root)? {
        match warning {
            ConfigWarning::DestructiveDest(path) => run.warn(format_args!(
                "output directory {} sits inside a mounted source directory and is removed on every run",
                path.display()
            )),
        }
    }

    let lockfile_path = lockfile_path.unwrap_or_else(|| project_root.join(LOCKFILE_NAME));
    let lockfile = ImportMap::load(&lockfile_path)?;

    // Enumerating
    run.advance(RunState::Enumerating);
    let exclude = ExcludeSet::compile(&config.exclude)?;
    let mounts: Vec<PathBuf> = config
        .mount
        .keys()
        .map(|dir| join_root(&project_root, dir))
        .collect();
    let files = enumerate_files(mounts, &exclude);
    tracing::debug!("enumerated {} candidate files", files.len());

    // Scanning
    run.advance(RunState::Scanning);
    let sources = load_sources(&files).await?;
    let mut scanned = Vec::new();
    for source in &sources {
        scanned.extend(scan_imports(source)?);
    }

    // Aggregating
    run.advance(RunState::Aggregating);
    let aliases = build_alias_table(&config.alias, &project_root);
    let targets = aggregate_targets(
        scanned,
        &config.known_entrypoints,
        config.web_dependencies.keys().cloned(),
        &aliases,
        &config.install_options.external_package,
    );
    tracing::info!("installing {} dependencies", targets.len());

    // Resolving
    run.advance(RunState::Resolving);
    let names = assign_output_names(targets.iter().map(|t| t.specifier.as_str()))?;
    let remote_dir = project_root.join(REMOTE_CACHE_DIR);

    let mut import_map = ImportMap::default();
    let mut entries: Vec<EntryInput> = Vec::new();
    let mut assets: Vec<(String, PathBuf)> = Vec::new();
    let mut asset_urls: FxHashMap<String, String> = FxHashMap::default();

    for target in &targets {
        let specifier = target.specifier.as_str();
        if let Some(url) = lockfile.get(specifier) {
            // The lockfile URL is authoritative; no resolution, no bundling.
            import_map.insert(specifier, url);
            continue;
        }

        let name = names[specifier].clone();
        let location = if config.web_dependencies.contains_key(specifier) {
            remote_entry(&remote_dir, specifier)
        } else {
            resolve_specifier(specifier, &project_root)
        };

        match location {
            Ok(location) => match location.kind {
                DependencyKind::Ignore => {
                    tracing::debug!("skipping types-only package \"{specifier}\"");
                }
                DependencyKind::Js => {
                    import_map.insert(specifier, format!("./{name}.js"));
                    entries.push(EntryInput {
                        name,
                        path: location.path,
                        target: target.clone(),
                    });
                }
                DependencyKind::Asset => {
                    import_map.insert(specifier, format!("./{name}"));
                    asset_urls.insert(specifier.to_string(), format!("./{name}"));
                    assets.push((name, location.path));
                }
            },
            Err(error) if config.install_options.skip_failures => {
                run.warn(format_args!("skipping \"{specifier}\": {error}"));
            }
            Err(error) => return Err(error),
        }
    }

    let chain = build_chain(ChainInputs {
        env: &config.install_options.env,
        aliases,
        remote: (!config.web_dependencies.is_empty()).then(|| RemoteCache {
            dir: remote_dir.clone(),
            keys: config.web_dependencies.keys().cloned().collect(),
        }),
        asset_urls,
        extra_named_exports: &config.install_options.named_exports,
        user_stages: &config.install_options.engine.plugins,
    });

    // Bundling. The destination is surrendered first: a failure from here
    // on leaves it removed, never half-written.
    run.advance(RunState::Bundling);
    let dest = join_root(&project_root, &config.install_options.dest);
    let previous_sizes = collect_previous_sizes(&dest);
    remove_dir_if_present(&dest)?;

    let engine = engine.unwrap_or_else(|| Arc::new(FlatLinker));
    let output = engine
        .bundle(BundleRequest {
            entries,
            external: config.install_options.external_package.clone(),
            dedupe: config.install_options.engine.dedupe.clone(),
            chain,
            source_map: config.install_options.source_map,
            treeshake: config.install_options.treeshake,
            project_root: project_root.clone(),
        })
        .await?;

    for warning in &output.warnings {
        match warning {
            EngineWarning::CircularDependency { cycle } => {
                if !run.circular_seen {
                    run.circular_seen = true;
                    run.warn(format_args!("circular dependency: {}", cycle.join(" -> ")));
                }
            }
            EngineWarning::Unresolved { id, importer } => {
                return Err(InstallError::Unresolved {
                    id: id.clone(),
                    importer: importer.replace('\\', "/"),
                });
            }
            EngineWarning::Other(message) => run.warn(message),
        }
    }

    // Emitting
    run.advance(RunState::Emitting);
    reset_output_dir(&dest)?;

    let mut outputs: Vec<(String, u64)> = Vec::new();
    for chunk in &output.chunks {
        write_output_file(&dest, &chunk.file_name, &chunk.code)?;
        outputs.push((chunk.file_name.clone(), chunk.code.len() as u64));
    }
    for (name, source_path) in &assets {
        let bytes = std::fs::read(source_path)?;
        write_output_file(&dest, name, &bytes)?;
        outputs.push((name.clone(), bytes.len() as u64));
    }

    import_map.write(&dest.join(IMPORT_MAP_FILE))?;
    let new_lockfile = import_map.clone();
    new_lockfile.write(&lockfile_path)?;

    let stats = DependencyStats::from_outputs(outputs, &previous_sizes);
    tracing::info!(
        "installed {} modules ({} bytes)",
        import_map.iter().count(),
        stats.total_size()
    );

    Ok(InstallResult {
        success: true,
        has_error: run.has_warning,
        import_map,
        new_lockfile: Some(new_lockfile),
        stats,
    })
}

/// A remote dependency resolves to its cached artifact.
fn remote_entry(
    remote_dir: &Path,
    specifier: &str,
) -> Result<crate::resolve::DependencyLocation> {
    let path = remote_dir.join(format!("{specifier}.js"));
    if path.is_file() {
        Ok(crate::resolve::DependencyLocation {
            kind: DependencyKind::Js,
            path,
        })
    } else {
        Err(InstallError::ResolutionFailure {
            specifier: specifier.to_string(),
            hint: Some(path),
        })
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf().clean())
    } else {
        Ok(std::env::current_dir()?.join(path).clean())
    }
}

fn join_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        root.join(path).clean()
    }
}

fn remove_dir_if_present(dest: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Sizes of the previous run's files, captured before the directory is
/// removed, keyed by output-relative forward-slash names.
fn collect_previous_sizes(dest: &Path) -> BTreeMap<String, u64> {
    let mut sizes = BTreeMap::new();
    for entry in walkdir::WalkDir::new(dest).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dest) else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        sizes.insert(
            relative.to_string_lossy().replace('\\', "/"),
            metadata.len(),
        );
    }
    sizes
}
