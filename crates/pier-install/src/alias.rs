//! Specifier aliasing.
//!
//! The config's `alias` map rewrites specifiers before resolution. Each
//! entry is classified once: package aliases participate in target rewriting
//! and in the engine's substitution stage; path and URL aliases describe
//! application-local mappings, so anything they match is not a third-party
//! install target at all.

use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    Package,
    Path,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub from: String,
    pub to: String,
    pub kind: AliasKind,
}

/// Classify and order the configured aliases.
///
/// Longer `from` keys win over shorter prefixes, so `react-dom` is matched
/// before `react`.
pub fn build_alias_table(alias: &BTreeMap<String, String>, project_root: &Path) -> Vec<AliasEntry> {
    let mut entries: Vec<AliasEntry> = alias
        .iter()
        .map(|(from, to)| AliasEntry {
            from: from.clone(),
            to: to.clone(),
            kind: classify_alias_value(to, project_root),
        })
        .collect();
    entries.sort_by(|a, b| b.from.len().cmp(&a.from.len()).then(a.from.cmp(&b.from)));
    entries
}

fn classify_alias_value(value: &str, project_root: &Path) -> AliasKind {
    if value.contains("://") {
        return AliasKind::Url;
    }
    if value.starts_with("./") || value.starts_with("../") || value.starts_with('/') {
        return AliasKind::Path;
    }
    // A bare value that names an existing directory is a directory mount,
    // not a package.
    if project_root.join(value).is_dir() {
        return AliasKind::Path;
    }
    AliasKind::Package
}

/// Find the alias entry matching a specifier, if any.
///
/// A match is exact or a `from` prefix followed by `/` (package-subpath
/// style), mirroring the external-package prefix test.
pub fn find_alias<'a>(entries: &'a [AliasEntry], specifier: &str) -> Option<&'a AliasEntry> {
    entries.iter().find(|entry| {
        specifier == entry.from
            || specifier
                .strip_prefix(&entry.from)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Rewrite a specifier through a package alias, carrying any subpath across.
pub fn apply_alias(entry: &AliasEntry, specifier: &str) -> String {
    match specifier.strip_prefix(&entry.from) {
        Some(rest) if !rest.is_empty() => format!("{}{rest}", entry.to),
        _ => entry.to.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> Vec<AliasEntry> {
        let map = pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        build_alias_table(&map, Path::new("/nonexistent-project"))
    }

    #[test]
    fn classifies_package_path_and_url() {
        let entries = table(&[
            ("react", "preact/compat"),
            ("components", "./src/components"),
            ("cdn", "https://cdn.example.com/x.js"),
        ]);
        let kind_of = |from: &str| entries.iter().find(|e| e.from == from).unwrap().kind;
        assert_eq!(kind_of("react"), AliasKind::Package);
        assert_eq!(kind_of("components"), AliasKind::Path);
        assert_eq!(kind_of("cdn"), AliasKind::Url);
    }

    #[test]
    fn longest_prefix_wins() {
        let entries = table(&[("react", "preact/compat"), ("react-dom", "preact/compat")]);
        let hit = find_alias(&entries, "react-dom").unwrap();
        assert_eq!(hit.from, "react-dom");
    }

    #[test]
    fn subpath_carries_across_rewrite() {
        let entries = table(&[("react", "preact/compat")]);
        let hit = find_alias(&entries, "react/jsx-runtime").unwrap();
        assert_eq!(apply_alias(hit, "react/jsx-runtime"), "preact/compat/jsx-runtime");
    }

    #[test]
    fn prefix_without_separator_does_not_match() {
        let entries = table(&[("react", "preact/compat")]);
        assert!(find_alias(&entries, "react-dom").is_none());
    }
}
