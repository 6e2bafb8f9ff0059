//! Install-target aggregation.
//!
//! Merges the three target streams (scanned imports, declared entry points,
//! remote-dependency keys), rewrites specifiers through package aliases,
//! filters externalized packages, and produces the deterministic, sorted
//! target list the resolver works from.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::alias::{apply_alias, find_alias, AliasEntry, AliasKind};

/// One unit of install work: a specifier plus the union of how the
/// application uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub specifier: String,
    /// The consumer needs the whole module surface (dynamic import, or a
    /// bare side-effect import).
    pub all: bool,
    pub default: bool,
    pub namespace: bool,
    pub named: BTreeSet<String>,
}

impl InstallTarget {
    /// A target for a specifier with no observed shape (declared entry
    /// points, remote-dependency keys).
    pub fn whole_module(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            all: true,
            default: false,
            namespace: false,
            named: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, other: InstallTarget) {
        self.all |= other.all;
        self.default |= other.default;
        self.namespace |= other.namespace;
        self.named.extend(other.named);
    }
}

/// Is `specifier` covered by an externalized-package prefix?
pub fn is_external(specifier: &str, external: &[String]) -> bool {
    external.iter().any(|prefix| {
        specifier == prefix
            || specifier
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Merge, alias, filter, sort.
///
/// Idempotent: feeding the output back through produces the same list.
pub fn aggregate_targets(
    scanned: Vec<InstallTarget>,
    known_entrypoints: &[String],
    web_dependencies: impl IntoIterator<Item = String>,
    aliases: &[AliasEntry],
    external: &[String],
) -> Vec<InstallTarget> {
    let declared = known_entrypoints
        .iter()
        .map(InstallTarget::whole_module)
        .chain(web_dependencies.into_iter().map(InstallTarget::whole_module));

    let mut merged: FxHashMap<String, InstallTarget> = FxHashMap::default();
    for mut target in scanned.into_iter().chain(declared) {
        match find_alias(aliases, &target.specifier) {
            Some(entry) if entry.kind == AliasKind::Package => {
                target.specifier = apply_alias(entry, &target.specifier);
            }
            // Path and URL aliases are application-local mappings; whatever
            // they cover is not an install target.
            Some(_) => continue,
            None => {}
        }

        if is_external(&target.specifier, external) {
            continue;
        }

        match merged.get_mut(&target.specifier) {
            Some(existing) => existing.absorb(target),
            None => {
                merged.insert(target.specifier.clone(), target);
            }
        }
    }

    let mut targets: Vec<InstallTarget> = merged.into_values().collect();
    targets.sort_by(|a, b| a.specifier.cmp(&b.specifier));
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::build_alias_table;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn target(specifier: &str, default: bool, named: &[&str]) -> InstallTarget {
        InstallTarget {
            specifier: specifier.to_string(),
            all: !default && named.is_empty(),
            default,
            namespace: false,
            named: named.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn merges_shapes_for_same_specifier() {
        let merged = aggregate_targets(
            vec![target("react", true, &[]), target("react", false, &["useState"])],
            &[],
            [],
            &[],
            &[],
        );
        assert_eq!(merged.len(), 1);
        let react = &merged[0];
        assert!(react.default);
        assert!(react.named.contains("useState"));
        assert!(!react.namespace);
        // neither source import used the whole surface
        assert!(!react.all);
    }

    #[test]
    fn declared_streams_are_whole_module() {
        let merged = aggregate_targets(
            vec![],
            &["preact/hooks".to_string()],
            ["htm".to_string()],
            &[],
            &[],
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|t| t.all));
        // sorted lexicographically
        assert_eq!(merged[0].specifier, "htm");
        assert_eq!(merged[1].specifier, "preact/hooks");
    }

    #[test]
    fn package_alias_rewrites_before_external_filter() {
        let aliases = build_alias_table(
            &BTreeMap::from([("react".to_string(), "preact/compat".to_string())]),
            Path::new("/nonexistent"),
        );
        let merged = aggregate_targets(
            vec![target("react", true, &[])],
            &[],
            [],
            &aliases,
            &[],
        );
        assert_eq!(merged[0].specifier, "preact/compat");
    }

    #[test]
    fn externalized_targets_are_removed() {
        let merged = aggregate_targets(
            vec![target("fs", false, &["readFile"]), target("fs/promises", true, &[])],
            &[],
            [],
            &[],
            &["fs".to_string()],
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn external_prefix_requires_separator() {
        let merged = aggregate_targets(
            vec![target("preact-router", true, &[])],
            &[],
            [],
            &[],
            &["preact".to_string()],
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let once = aggregate_targets(
            vec![target("react", true, &["useState"]), target("htm", false, &[])],
            &[],
            [],
            &[],
            &[],
        );
        let twice = aggregate_targets(once.clone(), &[], [], &[], &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn alias_into_external_is_order_independent() {
        let aliases = build_alias_table(
            &BTreeMap::from([("react".to_string(), "preact".to_string())]),
            Path::new("/nonexistent"),
        );
        let merged = aggregate_targets(
            vec![target("react", true, &[])],
            &[],
            [],
            &aliases,
            &["preact".to_string()],
        );
        assert!(merged.is_empty());
    }
}
