//! Bare-specifier resolution.
//!
//! Maps a bare specifier to a concrete file on disk. Node-style lookup is
//! reimplemented here as a pure function over the filesystem so resolution
//! never depends on a host runtime's private caches.
//!
//! The cascade, first match wins:
//! 1. direct file reference (specifier carries an extension and is not a
//!    package name)
//! 2. the package's `exports` map, for subpath specifiers
//! 3. the package manifest entry-field protocol
//! 4. raw node-style lookup on the specifier itself

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::manifest::PackageManifest;
use crate::{InstallError, Result};

/// What kind of artifact a specifier resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Bundled as an ES module.
    Js,
    /// Copied verbatim into the output directory.
    Asset,
    /// Types-only package; silently dropped from the install set.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLocation {
    pub kind: DependencyKind,
    pub path: PathBuf,
}

/// Obsolete workaround packages with official replacements.
const RESERVED_PACKAGES: [(&str, &str); 2] =
    [("@reactesm/", "react"), ("@pika/react", "react")];

/// Resolve one bare specifier against a project root.
pub fn resolve_specifier(specifier: &str, project_root: &Path) -> Result<DependencyLocation> {
    // 1. Direct file reference: `pkg/lib/thing.css`, `@scope/pkg/x.js`.
    if let Some(extension) = file_extension(specifier) {
        if !is_valid_package_name(specifier) {
            let base = find_package_path(project_root, specifier)
                .unwrap_or_else(|| project_root.join("node_modules").join(specifier));
            let path = node_resolve(&base).ok_or_else(|| InstallError::ResolutionFailure {
                specifier: specifier.to_string(),
                hint: Some(base.clone()),
            })?;
            let kind = if matches!(extension, "js" | "mjs" | "cjs") {
                DependencyKind::Js
            } else {
                DependencyKind::Asset
            };
            return Ok(DependencyLocation { kind, path });
        }
    }

    // 2. Export map, for package subpaths.
    let (package_name, subpath) = split_package_specifier(specifier);
    if !subpath.is_empty() {
        if let Some(package_dir) = find_package_dir(project_root, package_name)
            .filter(|dir| dir.join("package.json").is_file())
        {
            let manifest = PackageManifest::load(&package_dir)?;
            if let Some(value) = manifest.resolve_export(package_name, subpath)? {
                return Ok(DependencyLocation {
                    kind: DependencyKind::Js,
                    path: package_dir.join(value).clean(),
                });
            }
        }
    }

    // 3. Package manifest protocol, on the full specifier. A specifier like
    // `preact/hooks` is itself a package directory with its own manifest.
    for (prefix, replacement) in RESERVED_PACKAGES {
        if specifier.starts_with(prefix) {
            return Err(InstallError::ObsoletePackage {
                specifier: specifier.to_string(),
                replacement: replacement.to_string(),
            });
        }
    }
    if let Some(package_dir) = find_package_path(project_root, specifier) {
        if package_dir.join("package.json").is_file() {
            let manifest = PackageManifest::load(&package_dir)?;
            let (entry, implicit_index) = match manifest.select_entry(specifier) {
                Some(entry) => (entry, false),
                None => ("index.js".to_string(), true),
            };

            match node_resolve(&package_dir.join(&entry)) {
                Some(path) => {
                    return Ok(DependencyLocation {
                        kind: DependencyKind::Js,
                        path,
                    })
                }
                None if implicit_index && manifest.types_only() => {
                    return Ok(DependencyLocation {
                        kind: DependencyKind::Ignore,
                        path: package_dir,
                    })
                }
                None => {
                    return Err(InstallError::ResolutionFailure {
                        specifier: specifier.to_string(),
                        hint: Some(package_dir.join(entry)),
                    })
                }
            }
        }
    }

    // 4. Raw fallback: node-style lookup straight on the specifier.
    let base = find_package_path(project_root, specifier)
        .unwrap_or_else(|| project_root.join("node_modules").join(specifier));
    match node_resolve(&base) {
        Some(path) => Ok(DependencyLocation {
            kind: DependencyKind::Js,
            path,
        }),
        None => Err(InstallError::ResolutionFailure {
            specifier: specifier.to_string(),
            hint: Some(base),
        }),
    }
}

/// Node-style lookup as a pure filesystem probe: the exact path, then
/// extension suffixes, then a directory index.
pub fn node_resolve(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf().clean());
    }
    for ext in ["mjs", "cjs", "js", "json"] {
        let candidate = append_extension(base, ext);
        if candidate.is_file() {
            return Some(candidate.clean());
        }
    }
    let index = base.join("index.js");
    if index.is_file() {
        return Some(index.clean());
    }
    None
}

fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Find a package's directory by scanning `node_modules/` upward from the
/// project root.
pub fn find_package_dir(project_root: &Path, package_name: &str) -> Option<PathBuf> {
    project_root
        .ancestors()
        .map(|dir| dir.join("node_modules").join(package_name))
        .find(|candidate| candidate.is_dir())
}

/// Like `find_package_dir`, but for arbitrary node_modules-relative paths
/// (subpaths, direct files).
fn find_package_path(project_root: &Path, relative: &str) -> Option<PathBuf> {
    project_root
        .ancestors()
        .map(|dir| dir.join("node_modules").join(relative))
        .find(|candidate| candidate.exists())
}

/// Split a bare specifier into `(package name, subpath)`.
///
/// Scoped packages own their first two segments.
pub fn split_package_specifier(specifier: &str) -> (&str, &str) {
    let segments_in_name = if specifier.starts_with('@') { 2 } else { 1 };
    let mut split_at = specifier.len();
    let mut seen = 0;
    for (idx, byte) in specifier.bytes().enumerate() {
        if byte == b'/' {
            seen += 1;
            if seen == segments_in_name {
                split_at = idx;
                break;
            }
        }
    }
    let (name, rest) = specifier.split_at(split_at);
    (name, rest.strip_prefix('/').unwrap_or(rest))
}

/// npm's rules for a publishable top-level package name, simplified:
/// lowercase URL-safe characters, no leading `.` or `_`, at most one `/`
/// and only for a scope.
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 214 {
        return false;
    }
    if let Some(rest) = name.strip_prefix('@') {
        let Some((scope, package)) = rest.split_once('/') else {
            return false;
        };
        is_valid_name_part(scope) && is_valid_name_part(package)
    } else {
        !name.contains('/') && is_valid_name_part(name)
    }
}

fn is_valid_name_part(part: &str) -> bool {
    !part.is_empty()
        && !part.starts_with('.')
        && !part.starts_with('_')
        && part.bytes().all(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b'.' | b'~')
        })
}

/// The final path segment's extension, if it has one.
fn file_extension(specifier: &str) -> Option<&str> {
    let last_segment = specifier.rsplit('/').next()?;
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
