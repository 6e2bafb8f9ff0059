//! # pier-install
//!
//! The install core of Pier: scan application source for third-party module
//! specifiers, resolve each specifier to an on-disk entry point, and produce
//! a directory of browser-ready ES modules plus an import map.
//!
//! ## Quick start
//!
//! ```no_run
//! use pier_config::PierConfig;
//! use pier_install::{install, InstallRequest};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PierConfig::from_value(json!({
//!     "mount": { "src": "/_dist_" },
//! }))?;
//!
//! let result = install(InstallRequest::new(config, "./my-app")).await?;
//! for (specifier, url) in result.import_map.iter() {
//!     println!("{specifier} -> {url}");
//! }
//! # Ok(()) }
//! ```
//!
//! The pipeline is: enumerate mounted files, load them (extracting embedded
//! `<script>` blocks where needed), scan for imports, aggregate install
//! targets, resolve each target through the package-manifest protocol, then
//! drive a bundler engine over the resolved entries and emit the output
//! directory, the import map, and a refreshed lockfile.

pub mod aggregate;
pub mod alias;
pub mod emit;
pub mod engine;
pub mod extract;
pub mod linker;
pub mod load;
pub mod manifest;
pub mod orchestrate;
pub mod resolve;
pub mod scan;
pub mod stage;
pub mod stats;
pub mod walk;

#[cfg(feature = "logging")]
pub mod logging;

pub use aggregate::{aggregate_targets, InstallTarget};
pub use emit::{sanitize_name, ImportMap};
pub use engine::{
    BundleRequest, BundlerEngine, EmittedChunk, EngineOutput, EngineWarning, EntryInput,
};
pub use linker::FlatLinker;
pub use orchestrate::{install, DependencyStats, InstallRequest, InstallResult};
pub use resolve::{DependencyKind, DependencyLocation};
pub use scan::{classify_specifier, SpecifierKind};

use std::path::PathBuf;

/// Error type for the install pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Configuration rejected before enumeration.
    #[error(transparent)]
    Config(#[from] pier_config::ConfigError),

    /// Both scan phases failed on one file.
    #[error("could not parse imports from {path}")]
    ParseFailure { path: PathBuf },

    /// The resolution cascade exhausted every strategy.
    #[error("package not found: \"{specifier}\"")]
    ResolutionFailure {
        specifier: String,
        hint: Option<PathBuf>,
    },

    /// An export-map subpath resolved to something that is not a string.
    #[error("exports map of \"{package}\" has no usable entry for \"./{subpath}\"")]
    ExportMapMismatch { package: String, subpath: String },

    /// A reserved workaround package that has an official replacement.
    #[error("\"{specifier}\" is an obsolete workaround package")]
    ObsoletePackage {
        specifier: String,
        replacement: String,
    },

    /// The bundler engine failed.
    #[error("bundling failed{}: {message}", .file.as_deref().map(|f| format!(" in {f}")).unwrap_or_default())]
    Engine {
        message: String,
        /// Offending file, normalized to forward slashes.
        file: Option<String>,
    },

    /// A module id survived the whole stage chain unresolved.
    #[error("unresolved import \"{id}\" in {importer}")]
    Unresolved { id: String, importer: String },

    /// Two specifiers sanitize to the same output name.
    #[error("output name collision: \"{a}\" and \"{b}\" both produce \"{sanitized}\"")]
    NameCollision {
        a: String,
        b: String,
        sanitized: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the install pipeline.
pub type Result<T> = std::result::Result<T, InstallError>;

impl miette::Diagnostic for InstallError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            InstallError::Config(_) => "PIER::CONFIG",
            InstallError::ParseFailure { .. } => "PIER::PARSE",
            InstallError::ResolutionFailure { .. } => "PIER::RESOLVE",
            InstallError::ExportMapMismatch { .. } => "PIER::EXPORTS",
            InstallError::ObsoletePackage { .. } => "PIER::OBSOLETE",
            InstallError::Engine { .. } => "PIER::ENGINE",
            InstallError::Unresolved { .. } => "PIER::UNRESOLVED",
            InstallError::NameCollision { .. } => "PIER::COLLISION",
            InstallError::Io(_) => "PIER::IO",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            InstallError::ResolutionFailure {
                specifier,
                hint: Some(path),
            } => Some(Box::new(format!(
                "\"{specifier}\" could not be resolved. Last path examined: {}.\nIs the package installed?",
                path.display()
            ))),
            InstallError::ResolutionFailure { specifier, .. } => Some(Box::new(format!(
                "\"{specifier}\" could not be resolved. Is the package installed?"
            ))),
            InstallError::ObsoletePackage { replacement, .. } => Some(Box::new(format!(
                "This workaround package is no longer needed; install \"{replacement}\" instead."
            ))),
            InstallError::Engine {
                file: Some(file), ..
            } => missing_stage_hint(file).map(|hint| Box::new(hint) as Box<dyn std::fmt::Display>),
            InstallError::ExportMapMismatch { package, .. } => Some(Box::new(format!(
                "The \"exports\" field of \"{package}\" maps this subpath to a non-string value. \
                 File an issue with the package, or import a different subpath."
            ))),
            _ => None,
        }
    }
}

/// Suggest a likely missing stage from a failing file's extension.
fn missing_stage_hint(file: &str) -> Option<String> {
    let ext = file.rsplit('.').next()?;
    let suggestion = match ext {
        "css" | "scss" | "sass" | "less" => "a CSS stage",
        "svg" | "png" | "jpg" | "jpeg" | "gif" | "webp" => "an asset/url stage",
        "json" => "a JSON stage",
        "vue" => "a Vue compile stage",
        "svelte" => "a Svelte compile stage",
        _ => return None,
    };
    Some(format!(
        "\"{file}\" could not be bundled. You may need {suggestion} in installOptions.rollup.plugins."
    ))
}
