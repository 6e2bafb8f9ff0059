//! The bundler engine seam.
//!
//! Bundling proper is an external collaborator: the orchestrator prepares a
//! [`BundleRequest`] (entries, externals, the stage chain) and any engine
//! implementing [`BundlerEngine`] turns it into emitted chunks. The crate
//! ships [`crate::FlatLinker`] as the reference engine; embedders can swap
//! in a heavier bundler without touching the pipeline.

use std::path::PathBuf;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::aggregate::InstallTarget;
use crate::stage::{ModuleOrigin, Stage};
use crate::Result;

/// One JS entry the engine must produce a top-level output for.
#[derive(Debug, Clone)]
pub struct EntryInput {
    /// Sanitized output name (forward slashes, no extension).
    pub name: String,
    /// Resolved on-disk entry point.
    pub path: PathBuf,
    /// Aggregated usage shape for facade synthesis.
    pub target: InstallTarget,
}

/// Everything an engine needs for one invocation.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub entries: Vec<EntryInput>,
    pub external: Vec<String>,
    pub dedupe: Vec<String>,
    pub chain: Vec<Stage>,
    pub source_map: bool,
    pub treeshake: bool,
    pub project_root: PathBuf,
}

/// A file the engine wants written under the output directory.
#[derive(Debug, Clone)]
pub struct EmittedChunk {
    /// Output-relative file name, forward slashes.
    pub file_name: String,
    pub code: Vec<u8>,
    pub is_entry: bool,
}

/// Non-fatal findings from the engine. The orchestrator applies the warning
/// policy: first cycle reported, unresolved ids upgraded to errors.
#[derive(Debug, Clone)]
pub enum EngineWarning {
    CircularDependency { cycle: Vec<String> },
    Unresolved { id: String, importer: String },
    Other(String),
}

#[derive(Debug, Default)]
pub struct EngineOutput {
    pub chunks: Vec<EmittedChunk>,
    pub warnings: Vec<EngineWarning>,
    /// Post-transform sizes and origins, keyed by module id.
    pub module_sizes: FxHashMap<String, (usize, ModuleOrigin)>,
}

/// A bundler implementation the orchestrator can drive.
#[async_trait]
pub trait BundlerEngine: Send + Sync {
    async fn bundle(&self, request: BundleRequest) -> Result<EngineOutput>;
}
