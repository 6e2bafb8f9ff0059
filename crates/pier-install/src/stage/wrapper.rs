//! Entry facades for CommonJS packages consumed with named imports.
//!
//! `import { useState } from 'react'` only works if the installed module
//! statically exports `useState`. When the underlying package is CommonJS,
//! the wrapped module exports a default object plus whatever assignments the
//! interop stage could detect; the facade fills the gap by re-exporting the
//! requested bindings off the default object.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::aggregate::InstallTarget;

/// CommonJS packages whose named-import convention is well established.
pub const WELL_KNOWN_NAMED_EXPORTS: [&str; 8] = [
    "chai",
    "events",
    "prop-types",
    "react",
    "react-dom",
    "react-is",
    "scheduler",
    "uuid",
];

/// Build the facade module source for one entry, or `None` when the module
/// can be installed as-is.
///
/// A facade is only needed for CommonJS entries where the consumer asked for
/// named bindings (or the package is on the known-named list, `known`)
/// beyond what the interop wrapper already exports statically.
pub fn facade_module(
    target: &InstallTarget,
    entry_url: &str,
    is_cjs: bool,
    statically_exported: &[String],
    known: bool,
) -> Option<String> {
    if !is_cjs {
        return None;
    }

    let missing: BTreeSet<&String> = target
        .named
        .iter()
        .filter(|name| !statically_exported.contains(name))
        .collect();
    if missing.is_empty() && !(known && (target.namespace || target.all)) {
        return None;
    }

    let entry = serde_json::to_string(entry_url).expect("string serializes");
    let mut out = String::new();
    let _ = writeln!(out, "import __pier_entry from {entry};");
    let _ = writeln!(out, "export default __pier_entry;");
    let _ = writeln!(out, "export * from {entry};");
    for name in missing {
        let _ = writeln!(out, "export const {name} = __pier_entry.{name};");
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet as Set;

    fn target(specifier: &str, named: &[&str], all: bool) -> InstallTarget {
        InstallTarget {
            specifier: specifier.to_string(),
            all,
            default: false,
            namespace: false,
            named: named.iter().map(|s| s.to_string()).collect::<Set<_>>(),
        }
    }

    #[test]
    fn esm_entries_need_no_facade() {
        let t = target("preact", &["h", "render"], false);
        assert!(facade_module(&t, "./preact-entry.js", false, &[], false).is_none());
    }

    #[test]
    fn missing_named_bindings_produce_facade() {
        let t = target("react", &["useState", "useEffect"], false);
        let out =
            facade_module(&t, "./react-entry.js", true, &["version".to_string()], true).unwrap();
        assert!(out.contains("import __pier_entry from \"./react-entry.js\";"));
        assert!(out.contains("export const useState = __pier_entry.useState;"));
        assert!(out.contains("export const useEffect = __pier_entry.useEffect;"));
        assert!(!out.contains("export const version"));
    }

    #[test]
    fn statically_covered_bindings_skip_facade() {
        let t = target("some-lib", &["parse"], false);
        assert!(facade_module(&t, "./x.js", true, &["parse".to_string()], false).is_none());
    }

    #[test]
    fn well_known_package_with_whole_surface_gets_facade() {
        let t = target("react", &[], true);
        assert!(facade_module(&t, "./react-entry.js", true, &[], true).is_some());
    }
}
