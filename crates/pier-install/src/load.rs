//! Source loading and extension classification.
//!
//! Files from the enumerator are grouped by extension: script files are read
//! verbatim, markup files go through `<script>` extraction, extension-less
//! files (README, LICENSE) are skipped silently, and anything without a
//! recognized web MIME group is skipped with a single warning per extension.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::extract::extract_scripts;
use crate::{InstallError, Result};

/// How a candidate file participates in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceGroup {
    /// `.js .jsx .mjs .ts .tsx` — scanned as-is.
    Script,
    /// `.html .vue .svelte` — scanned after `<script>` extraction.
    Markup,
    /// No extension — not a source file, skipped without comment.
    Bare,
    /// Recognized non-script web content (css, images, fonts, …) — skipped.
    OtherKnown,
    /// Unrecognized extension — skipped with an ignore warning.
    Unknown,
}

/// A file's content, ready for the import scanner.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    /// Original extension, lowercased (drives the scanner's phase-1 skip).
    pub extension: String,
    pub contents: String,
}

pub fn classify(path: &Path) -> SourceGroup {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return SourceGroup::Bare;
    };
    match ext.to_ascii_lowercase().as_str() {
        "js" | "jsx" | "mjs" | "ts" | "tsx" => SourceGroup::Script,
        "html" | "vue" | "svelte" => SourceGroup::Markup,
        ext if has_known_mime(ext) => SourceGroup::OtherKnown,
        _ => SourceGroup::Unknown,
    }
}

/// Extensions with a well-known web MIME type that are nevertheless not
/// import sources.
fn has_known_mime(ext: &str) -> bool {
    matches!(
        ext,
        "css" | "scss" | "sass" | "less" | "json" | "map" | "txt" | "md" | "xml" | "svg" | "png"
            | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "ico" | "woff" | "woff2" | "ttf" | "otf"
            | "eot" | "mp3" | "mp4" | "webm" | "wasm" | "pdf"
    )
}

/// Load every scannable file, concurrently, preserving input order.
///
/// Concurrency is bounded by a semaphore sized for the host file system;
/// correctness never depends on the cap because results are re-ordered to
/// the input sequence before returning.
pub async fn load_sources(files: &[PathBuf]) -> Result<Vec<LoadedSource>> {
    let permits = num_cpus::get().min(8);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut join_set = JoinSet::new();

    let mut warned_extensions: FxHashSet<String> = FxHashSet::default();
    for (index, path) in files.iter().enumerate() {
        match classify(path) {
            SourceGroup::Script | SourceGroup::Markup => {}
            SourceGroup::Bare | SourceGroup::OtherKnown => continue,
            SourceGroup::Unknown => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if warned_extensions.insert(ext.clone()) {
                    tracing::warn!("ignoring files with unrecognized extension \".{ext}\"");
                }
                continue;
            }
        }

        let path = path.clone();
        let permit = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = permit.acquire().await.expect("semaphore closed");
            let loaded = load_one(&path).await;
            (index, loaded)
        });
    }

    let mut slots: Vec<Option<LoadedSource>> = (0..files.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, loaded) = joined.map_err(|e| InstallError::Engine {
            message: format!("load task panicked: {e}"),
            file: None,
        })?;
        slots[index] = Some(loaded?);
    }

    Ok(slots.into_iter().flatten().collect())
}

async fn load_one(path: &Path) -> Result<LoadedSource> {
    let raw = tokio::fs::read_to_string(path).await?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let contents = match classify(path) {
        SourceGroup::Markup => extract_scripts(&raw).map_err(|e| InstallError::Engine {
            message: e.to_string(),
            file: Some(path.to_string_lossy().replace('\\', "/")),
        })?,
        _ => raw,
    };

    Ok(LoadedSource {
        path: path.to_path_buf(),
        extension,
        contents,
    })
}
