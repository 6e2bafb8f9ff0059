//! The reference bundler engine.
//!
//! `FlatLinker` relinks a module graph file-by-file: every reachable module
//! is emitted as its own ES module, with import specifiers rewritten to the
//! emitted URLs. Entry points get a top-level file; internal modules land
//! under `common/` with content-addressed names, so modules shared between
//! entries are deduplicated by construction. No scope merging, no
//! minification.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use path_clean::PathClean;
use regex::{Captures, Regex};
use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};

use crate::aggregate::is_external;
use crate::engine::{BundleRequest, BundlerEngine, EmittedChunk, EngineOutput, EngineWarning};
use crate::resolve::{node_resolve, resolve_specifier, split_package_specifier};
use crate::scan::{module_dependencies, module_has_default_export};
use crate::stage::{
    detect_named_exports, facade_module, forward_slashes, is_commonjs, ModuleOrigin,
    ModuleRecord, Stage, StageContext, WELL_KNOWN_NAMED_EXPORTS,
};
use crate::Result;

/// File extensions the linker loads as text and runs through the chain.
fn is_code_extension(ext: &str) -> bool {
    matches!(ext, "js" | "mjs" | "cjs" | "json" | "css")
}

#[derive(Debug)]
enum NodeContent {
    Code(String),
    Asset(Vec<u8>),
}

#[derive(Debug)]
struct Node {
    id: String,
    path: PathBuf,
    content: NodeContent,
    /// `(specifier as written, edge)` pairs.
    edges: Vec<(String, Edge)>,
    was_cjs: bool,
    cjs_named: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Edge {
    Internal(usize),
    External,
}

/// Where an emitted chunk lives, for relative-URL computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkBase {
    /// Top-level entry file, `depth` directories below the output root
    /// (scoped names like `@scope/pkg.js` nest).
    Root { depth: usize },
    /// Inside `common/`.
    Common,
}

fn url_to_common(base: ChunkBase, name: &str) -> String {
    match base {
        ChunkBase::Root { depth: 0 } => format!("./common/{name}"),
        ChunkBase::Root { depth } => format!("{}common/{name}", "../".repeat(depth)),
        ChunkBase::Common => format!("./{name}"),
    }
}

/// The in-tree engine implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatLinker;

#[async_trait]
impl BundlerEngine for FlatLinker {
    async fn bundle(&self, request: BundleRequest) -> Result<EngineOutput> {
        let mut cx = StageContext::default();
        let mut graph = Graph::new(&request);

        let entry_indices: Vec<usize> = request
            .entries
            .iter()
            .map(|entry| graph.crawl(&entry.path, &mut cx))
            .collect::<Result<_>>()?;

        let mut warnings: Vec<EngineWarning> = Vec::new();
        if let Some(cycle) = graph.first_cycle() {
            warnings.push(EngineWarning::CircularDependency { cycle });
        }
        for (id, importer) in std::mem::take(&mut cx.unresolved) {
            warnings.push(EngineWarning::Unresolved { id, importer });
        }

        let chunks = graph.emit(request_entries(&request, &entry_indices));

        let mut module_sizes = std::mem::take(&mut cx.sizes);
        for node in &graph.nodes {
            if let NodeContent::Asset(bytes) = &node.content {
                module_sizes.insert(node.id.clone(), (bytes.len(), ModuleOrigin::Disk));
            }
        }

        Ok(EngineOutput {
            chunks,
            warnings,
            module_sizes,
        })
    }
}

struct EntryPlan<'a> {
    name: &'a str,
    node: usize,
    target: &'a crate::aggregate::InstallTarget,
}

fn request_entries<'a>(
    request: &'a BundleRequest,
    entry_indices: &[usize],
) -> Vec<EntryPlan<'a>> {
    request
        .entries
        .iter()
        .zip(entry_indices)
        .map(|(entry, &node)| EntryPlan {
            name: &entry.name,
            node,
            target: &entry.target,
        })
        .collect()
}

struct Graph<'a> {
    request: &'a BundleRequest,
    nodes: Vec<Node>,
    index_of: FxHashMap<PathBuf, usize>,
}

impl<'a> Graph<'a> {
    fn new(request: &'a BundleRequest) -> Self {
        Self {
            request,
            nodes: Vec::new(),
            index_of: FxHashMap::default(),
        }
    }

    /// Load, transform, and wire one module; returns its arena index.
    fn crawl(&mut self, path: &Path, cx: &mut StageContext) -> Result<usize> {
        let path = path.to_path_buf().clean();
        if let Some(&index) = self.index_of.get(&path) {
            return Ok(index);
        }

        let id = forward_slashes(&path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !is_code_extension(&extension) {
            let bytes = std::fs::read(&path)?;
            let index = self.nodes.len();
            self.nodes.push(Node {
                id,
                path: path.clone(),
                content: NodeContent::Asset(bytes),
                edges: Vec::new(),
                was_cjs: false,
                cjs_named: Vec::new(),
            });
            self.index_of.insert(path, index);
            return Ok(index);
        }

        let (raw, origin) = self.load_source(&path)?;
        if origin == ModuleOrigin::RemoteCache {
            cx.sizes.insert(id.clone(), (raw.len(), origin));
        }

        let was_cjs = matches!(extension.as_str(), "js" | "cjs") && is_commonjs(&raw);
        let cjs_named = if was_cjs {
            detect_named_exports(&raw)
        } else {
            Vec::new()
        };

        let mut module = ModuleRecord {
            id: id.clone(),
            path: path.clone(),
            source: raw,
        };
        for stage in &self.request.chain {
            stage.transform(&mut module, cx)?;
        }

        // Reserve the slot before descending so cycles terminate.
        let index = self.nodes.len();
        self.index_of.insert(path.clone(), index);
        self.nodes.push(Node {
            id: id.clone(),
            path,
            content: NodeContent::Code(module.source),
            edges: Vec::new(),
            was_cjs,
            cjs_named,
        });

        let specifiers = {
            let NodeContent::Code(source) = &self.nodes[index].content else {
                unreachable!("code node just inserted");
            };
            match module_dependencies(source) {
                Some(specifiers) => specifiers,
                None => {
                    cx.unresolved.push((id.clone(), id));
                    Vec::new()
                }
            }
        };

        let mut edges = Vec::new();
        for specifier in specifiers {
            let importer = self.nodes[index].path.clone();
            let edge = self.resolve_edge(&specifier, &importer, cx)?;
            edges.push((specifier, edge));
        }
        self.nodes[index].edges = edges;

        Ok(index)
    }

    fn load_source(&self, path: &Path) -> Result<(String, ModuleOrigin)> {
        for stage in &self.request.chain {
            if let Some((source, origin)) = stage.load(&forward_slashes(path)) {
                return Ok((source, origin));
            }
        }
        Ok((std::fs::read_to_string(path)?, ModuleOrigin::Disk))
    }

    /// Resolve one import edge: chain resolve hooks, then the external
    /// rules, then pure node-style lookup. Failures become unresolved
    /// findings, not hard errors; the orchestrator upgrades them.
    fn resolve_edge(
        &mut self,
        specifier: &str,
        importer: &Path,
        cx: &mut StageContext,
    ) -> Result<Edge> {
        let importer_id = forward_slashes(importer);

        let mut current = specifier.to_string();
        for stage in &self.request.chain {
            if let Some(rewritten) = stage.resolve(&current, &importer_id) {
                current = rewritten;
            }
        }

        if is_external(&current, &self.request.external) {
            return Ok(Edge::External);
        }

        let importer_dir = importer.parent().unwrap_or(importer);
        let resolved: Option<PathBuf> = if current.starts_with("./") || current.starts_with("../")
        {
            node_resolve(&importer_dir.join(&current))
        } else if Path::new(&current).is_absolute() {
            node_resolve(Path::new(&current))
        } else {
            // Bare specifier inside a package. The dedupe list pins a
            // package to the project root's copy; everything else resolves
            // from the importing module outward.
            let package = split_package_specifier(&current).0.to_string();
            let root = if self.request.dedupe.contains(&package) {
                self.request.project_root.as_path()
            } else {
                importer_dir
            };
            resolve_specifier(&current, root).ok().map(|loc| loc.path)
        };

        match resolved {
            Some(path) => Ok(Edge::Internal(self.crawl(&path, cx)?)),
            None => {
                cx.unresolved.push((current, importer_id));
                Ok(Edge::External)
            }
        }
    }

    /// First dependency cycle in the graph, by DFS coloring.
    fn first_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        fn visit(
            graph: &Graph<'_>,
            index: usize,
            colors: &mut [Color],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            colors[index] = Color::Grey;
            stack.push(index);

            for (_, edge) in &graph.nodes[index].edges {
                let Edge::Internal(next) = edge else { continue };
                match colors[*next] {
                    Color::Grey => {
                        let start = stack.iter().position(|&i| i == *next).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..]
                            .iter()
                            .map(|&i| graph.nodes[i].id.clone())
                            .collect();
                        cycle.push(graph.nodes[*next].id.clone());
                        return Some(cycle);
                    }
                    Color::White => {
                        if let Some(cycle) = visit(graph, *next, colors, stack) {
                            return Some(cycle);
                        }
                    }
                    Color::Black => {}
                }
            }

            stack.pop();
            colors[index] = Color::Black;
            None
        }

        let mut colors = vec![Color::White; self.nodes.len()];
        let mut stack = Vec::new();
        (0..self.nodes.len()).find_map(|i| {
            if colors[i] == Color::White {
                visit(self, i, &mut colors, &mut stack)
            } else {
                None
            }
        })
    }

    /// Emit chunks: one top-level file per entry, one `common/` file per
    /// module that anything imports.
    ///
    /// An entry whose module is also imported internally (or which needs a
    /// CommonJS facade) is emitted under `common/` with a thin re-export
    /// facade at the top level, so the module is instantiated exactly once.
    fn emit(&self, entries: Vec<EntryPlan<'_>>) -> Vec<EmittedChunk> {
        let mut incoming: FxHashSet<usize> = FxHashSet::default();
        for node in &self.nodes {
            for (_, edge) in &node.edges {
                if let Edge::Internal(target) = edge {
                    incoming.insert(*target);
                }
            }
        }
        let mut entry_names_per_node: FxHashMap<usize, usize> = FxHashMap::default();
        for entry in &entries {
            *entry_names_per_node.entry(entry.node).or_insert(0) += 1;
        }

        let mut direct_entry: FxHashMap<usize, &str> = FxHashMap::default();
        let mut facades: Vec<(String, String)> = Vec::new();

        for entry in &entries {
            let node = &self.nodes[entry.node];
            let depth = entry.name.matches('/').count();
            let base = ChunkBase::Root { depth };
            let common_url = url_to_common(base, &self.common_name(entry.node));

            let known = self.is_known_named(&entry.target.specifier);
            let wrapper = facade_module(
                entry.target,
                &common_url,
                node.was_cjs,
                &node.cjs_named,
                known,
            );
            let shared = incoming.contains(&entry.node)
                || entry_names_per_node.get(&entry.node).copied().unwrap_or(0) > 1;

            match wrapper {
                Some(source) => facades.push((format!("{}.js", entry.name), source)),
                None if shared => {
                    let source = match &node.content {
                        NodeContent::Code(code) => reexport_facade(&common_url, code),
                        NodeContent::Asset(_) => continue,
                    };
                    facades.push((format!("{}.js", entry.name), source));
                }
                None => {
                    direct_entry.insert(entry.node, entry.name);
                }
            }
        }

        let mut chunks = Vec::new();

        for (index, node) in self.nodes.iter().enumerate() {
            match &node.content {
                NodeContent::Asset(bytes) => {
                    // Only referenced assets are emitted; an asset nobody
                    // imports never entered the graph.
                    chunks.push(EmittedChunk {
                        file_name: format!("common/{}", self.common_name(index)),
                        code: bytes.clone(),
                        is_entry: false,
                    });
                }
                NodeContent::Code(source) => match direct_entry.get(&index) {
                    Some(name) => {
                        let base = ChunkBase::Root {
                            depth: name.matches('/').count(),
                        };
                        chunks.push(EmittedChunk {
                            file_name: format!("{name}.js"),
                            code: self.rewrite_specifiers(source, node, base).into_bytes(),
                            is_entry: true,
                        });
                    }
                    None => {
                        chunks.push(EmittedChunk {
                            file_name: format!("common/{}", self.common_name(index)),
                            code: self
                                .rewrite_specifiers(source, node, ChunkBase::Common)
                                .into_bytes(),
                            is_entry: false,
                        });
                    }
                },
            }
        }

        for (file_name, source) in facades {
            chunks.push(EmittedChunk {
                file_name,
                code: source.into_bytes(),
                is_entry: true,
            });
        }

        chunks.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        chunks
    }

    /// Content-addressed name for a node emitted under `common/`.
    fn common_name(&self, index: usize) -> String {
        let node = &self.nodes[index];
        let stem = node
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");
        let bytes: &[u8] = match &node.content {
            NodeContent::Code(source) => source.as_bytes(),
            NodeContent::Asset(bytes) => bytes,
        };
        let hash = hex_prefix(&Sha256::digest(bytes), 8);
        match &node.content {
            NodeContent::Code(_) => format!("{stem}-{hash}.js"),
            NodeContent::Asset(_) => match node.path.extension().and_then(|e| e.to_str()) {
                Some(ext) => format!("{stem}-{hash}.{ext}"),
                None => format!("{stem}-{hash}"),
            },
        }
    }

    /// Is this package on the known named-import list (built-in allow-list
    /// plus the config's `namedExports`, carried by the wrapper stage)?
    fn is_known_named(&self, specifier: &str) -> bool {
        for stage in &self.request.chain {
            if let Stage::EntryWrapper(options) = stage {
                return options.known_named.contains(specifier);
            }
        }
        WELL_KNOWN_NAMED_EXPORTS.contains(&specifier)
    }

    /// Rewrite a module's import specifiers to output-relative URLs.
    fn rewrite_specifiers(&self, source: &str, node: &Node, base: ChunkBase) -> String {
        let mut map: FxHashMap<&str, String> = FxHashMap::default();
        for (specifier, edge) in &node.edges {
            let Edge::Internal(target) = edge else { continue };
            map.insert(
                specifier.as_str(),
                url_to_common(base, &self.common_name(*target)),
            );
        }
        replace_import_sources(source, &map)
    }
}

/// Thin top-level facade for an ES-module entry that also lives in
/// `common/`: re-export the surface, forward the default if there is one.
fn reexport_facade(common_url: &str, module_source: &str) -> String {
    let url = serde_json::to_string(common_url).expect("string serializes");
    let mut out = format!("export * from {url};\n");
    if module_has_default_export(module_source) {
        out.push_str(&format!("export {{ default }} from {url};\n"));
    }
    out
}

static FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\bfrom\s*)(["'])([^"'\n]+)(["'])"#).unwrap());
static BARE_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)(^\s*import\s*)(["'])([^"'\n]+)(["'])"#).unwrap());
static DYNAMIC_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\bimport\s*\(\s*)(["'])([^"'\n]+)(["'])"#).unwrap());

fn replace_import_sources(source: &str, map: &FxHashMap<&str, String>) -> String {
    let substitute = |caps: &Captures<'_>| -> String {
        match map.get(&caps[3]) {
            Some(url) => format!("{}{}{}{}", &caps[1], &caps[2], url, &caps[4]),
            None => caps[0].to_string(),
        }
    };
    let pass1 = FROM_RE.replace_all(source, substitute);
    let pass2 = BARE_IMPORT_RE.replace_all(&pass1, substitute);
    DYNAMIC_IMPORT_RE
        .replace_all(&pass2, substitute)
        .into_owned()
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars + 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
        if out.len() >= chars {
            break;
        }
    }
    out.truncate(chars);
    out
}
