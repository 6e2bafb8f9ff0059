//! End-to-end installs over temporary project fixtures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pier_config::PierConfig;
use pier_install::{install, ImportMap, InstallError, InstallRequest};
use serde_json::json;

struct Fixture {
    tmp: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        Self { tmp }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn dest(&self) -> PathBuf {
        self.root().join("web_modules")
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn write_package(&self, name: &str, manifest: serde_json::Value, files: &[(&str, &str)]) {
        let dir = self.root().join("node_modules").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        for (relative, contents) in files {
            let path = dir.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    fn config(&self, value: serde_json::Value) -> PierConfig {
        let mut base = json!({ "mount": { "src": "/_dist_" } });
        merge(&mut base, value);
        PierConfig::from_value(base).unwrap()
    }
}

fn merge(base: &mut serde_json::Value, update: serde_json::Value) {
    match (base, update) {
        (serde_json::Value::Object(base), serde_json::Value::Object(update)) => {
            for (key, value) in update {
                merge(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn write_preact(fixture: &Fixture) {
    fixture.write_package(
        "preact",
        json!({ "name": "preact", "module": "./dist/preact.module.js" }),
        &[
            (
                "dist/preact.module.js",
                "import { slice } from './util.js';\nexport function h(tag) { return slice([tag]); }\nexport function render() {}\n",
            ),
            ("dist/util.js", "export const slice = (a) => a.slice();\n"),
        ],
    );
}

#[tokio::test]
async fn installs_esm_package_with_internal_chunk() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "import { h } from 'preact';\nh('div');\n");

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.has_error);
    assert_eq!(result.import_map.get("preact"), Some("./preact.js"));

    let entry = fs::read_to_string(fixture.dest().join("preact.js")).unwrap();
    assert!(entry.contains("export function h"));
    assert!(entry.contains("from './common/util-"));

    let common: Vec<_> = fs::read_dir(fixture.dest().join("common"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(common.len(), 1);
    assert!(common[0].starts_with("util-") && common[0].ends_with(".js"));

    // import map emitted inside the destination
    let emitted: ImportMap =
        serde_json::from_str(&fs::read_to_string(fixture.dest().join("import-map.json")).unwrap())
            .unwrap();
    assert_eq!(emitted, result.import_map);
}

#[tokio::test]
async fn commonjs_package_gets_named_reexports() {
    let fixture = Fixture::new();
    fixture.write_package(
        "qs-lite",
        json!({ "name": "qs-lite", "main": "./index.js" }),
        &[(
            "index.js",
            "exports.parse = function (s) { return s; };\nexports.stringify = function (o) { return String(o); };\n",
        )],
    );
    fixture.write(
        "src/app.js",
        "import qs from 'qs-lite';\nimport { parse } from 'qs-lite';\nparse(qs);\n",
    );

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();
    assert_eq!(result.import_map.get("qs-lite"), Some("./qs-lite.js"));

    let module = fs::read_to_string(fixture.dest().join("qs-lite.js")).unwrap();
    assert!(module.contains("export default module.exports;"));
    assert!(module.contains("export const parse = module.exports.parse;"));
    assert!(module.contains("export const stringify = module.exports.stringify;"));
}

#[tokio::test]
async fn externalized_packages_never_reach_the_output() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write(
        "src/index.js",
        "import { h } from 'preact';\nimport fs from 'fs';\nh(fs);\n",
    );

    let result = install(InstallRequest::new(
        fixture.config(json!({ "installOptions": { "externalPackage": ["fs"] } })),
        fixture.root(),
    ))
    .await
    .unwrap();

    assert!(result.import_map.get("fs").is_none());
    assert!(!fixture.dest().join("fs.js").exists());
    assert_eq!(result.import_map.get("preact"), Some("./preact.js"));
}

#[tokio::test]
async fn lockfile_entries_bypass_resolution_and_bundling() {
    let fixture = Fixture::new();
    // `react` is not even installed; the lockfile alone must carry it.
    fixture.write(
        "pier.lock.json",
        "{\n  \"imports\": {\n    \"react\": \"./react.v17.js\"\n  }\n}",
    );
    fixture.write("src/index.js", "import React from 'react';\nReact;\n");

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();

    assert_eq!(result.import_map.get("react"), Some("./react.v17.js"));
    assert!(!fixture.dest().join("react.js").exists());
}

#[tokio::test]
async fn missing_package_is_fatal_without_skip_failures() {
    let fixture = Fixture::new();
    fixture.write("src/index.js", "import ghost from 'ghost-pkg';\nghost;\n");

    let error = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap_err();
    match error {
        InstallError::ResolutionFailure { specifier, hint } => {
            assert_eq!(specifier, "ghost-pkg");
            assert!(hint.unwrap().ends_with("node_modules/ghost-pkg"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // fatal errors leave the destination removed
    assert!(!fixture.dest().exists());
}

#[tokio::test]
async fn skip_failures_downgrades_to_warning() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write(
        "src/index.js",
        "import { h } from 'preact';\nimport ghost from 'ghost-pkg';\nh(ghost);\n",
    );

    let result = install(InstallRequest::new(
        fixture.config(json!({ "installOptions": { "skipFailures": true } })),
        fixture.root(),
    ))
    .await
    .unwrap();

    assert!(result.success);
    assert!(result.has_error);
    assert!(result.import_map.get("ghost-pkg").is_none());
    assert_eq!(result.import_map.get("preact"), Some("./preact.js"));
}

#[tokio::test]
async fn html_script_blocks_are_scanned() {
    let fixture = Fixture::new();
    fixture.write_package(
        "htm",
        json!({ "name": "htm", "module": "./index.mjs" }),
        &[("index.mjs", "export default function htm() {}\n")],
    );
    fixture.write(
        "src/index.html",
        "<!doctype html>\n<html><body>\n<script type=\"module\">import htm from 'htm'; htm();</script>\n</body></html>\n",
    );

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();
    assert_eq!(result.import_map.get("htm"), Some("./htm.js"));
}

#[tokio::test]
async fn asset_specifiers_are_copied_verbatim() {
    let fixture = Fixture::new();
    fixture.write_package(
        "tiny-icons",
        json!({ "name": "tiny-icons" }),
        &[("logo.svg", "<svg viewBox=\"0 0 1 1\"></svg>")],
    );
    fixture.write("src/index.js", "import 'tiny-icons/logo.svg';\n");

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();

    assert_eq!(
        result.import_map.get("tiny-icons/logo.svg"),
        Some("./tiny-icons/logo.svg")
    );
    let copied = fs::read_to_string(fixture.dest().join("tiny-icons/logo.svg")).unwrap();
    assert_eq!(copied, "<svg viewBox=\"0 0 1 1\"></svg>");
}

#[tokio::test]
async fn environment_probes_are_replaced() {
    let fixture = Fixture::new();
    fixture.write_package(
        "env-probe",
        json!({ "name": "env-probe", "module": "./index.js" }),
        &[(
            "index.js",
            "export const mode = process.env.NODE_ENV;\nexport const node = typeof process.versions.node;\n",
        )],
    );
    fixture.write("src/index.js", "import { mode } from 'env-probe';\nmode;\n");

    install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();

    let module = fs::read_to_string(fixture.dest().join("env-probe.js")).unwrap();
    assert!(module.contains("const mode = \"production\";"));
    assert!(module.contains("const node = \"undefined\";"));
    assert!(!module.contains("process.env"));
}

#[tokio::test]
async fn circular_dependencies_warn_but_complete() {
    let fixture = Fixture::new();
    fixture.write_package(
        "loop-pkg",
        json!({ "name": "loop-pkg", "module": "./a.js" }),
        &[
            ("a.js", "import { b } from './b.js';\nexport const a = () => b;\n"),
            ("b.js", "import { a } from './a.js';\nexport const b = () => a;\n"),
        ],
    );
    fixture.write("src/index.js", "import { a } from 'loop-pkg';\na();\n");

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.has_error);
    assert_eq!(result.import_map.get("loop-pkg"), Some("./loop-pkg.js"));
}

#[tokio::test]
async fn package_aliases_rewrite_targets() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "import { h } from 'react';\nh('div');\n");

    let result = install(InstallRequest::new(
        fixture.config(json!({ "alias": { "react": "preact" } })),
        fixture.root(),
    ))
    .await
    .unwrap();

    assert!(result.import_map.get("react").is_none());
    assert_eq!(result.import_map.get("preact"), Some("./preact.js"));
}

#[tokio::test]
async fn known_entrypoints_install_without_imports() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "console.log('no imports here');\n");

    let result = install(InstallRequest::new(
        fixture.config(json!({ "knownEntrypoints": ["preact"] })),
        fixture.root(),
    ))
    .await
    .unwrap();
    assert_eq!(result.import_map.get("preact"), Some("./preact.js"));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "import { h } from 'preact';\nh('div');\n");

    let config = fixture.config(json!({}));
    install(InstallRequest::new(config.clone(), fixture.root()))
        .await
        .unwrap();
    let lock_first = fs::read(fixture.root().join("pier.lock.json")).unwrap();
    let map_first = fs::read(fixture.dest().join("import-map.json")).unwrap();

    // Unchanged inputs: clear the cross-invocation state and rerun.
    fs::remove_file(fixture.root().join("pier.lock.json")).unwrap();
    install(InstallRequest::new(config, fixture.root()))
        .await
        .unwrap();
    let lock_second = fs::read(fixture.root().join("pier.lock.json")).unwrap();
    let map_second = fs::read(fixture.dest().join("import-map.json")).unwrap();

    assert_eq!(lock_first, lock_second);
    assert_eq!(map_first, map_second);
}

#[tokio::test]
async fn output_directory_is_replaced_wholesale() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "import { h } from 'preact';\nh('div');\n");
    fixture.write("web_modules/stale.js", "// left over from a previous run\n");

    install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();
    assert!(!fixture.dest().join("stale.js").exists());
    assert!(fixture.dest().join("preact.js").exists());
}

#[tokio::test]
async fn empty_mount_is_rejected_before_enumeration() {
    let fixture = Fixture::new();
    let config = PierConfig::from_value(json!({})).unwrap();
    let error = install(InstallRequest::new(config, fixture.root()))
        .await
        .unwrap_err();
    assert!(matches!(error, InstallError::Config(_)));
}

#[tokio::test]
async fn stats_report_covers_all_outputs() {
    let fixture = Fixture::new();
    write_preact(&fixture);
    fixture.write("src/index.js", "import { h } from 'preact';\nh('div');\n");

    let result = install(InstallRequest::new(fixture.config(json!({})), fixture.root()))
        .await
        .unwrap();
    let direct: Vec<_> = result.stats.direct.iter().map(|e| e.file_name.as_str()).collect();
    assert!(direct.contains(&"preact.js"));
    assert_eq!(result.stats.common.len(), 1);
    assert!(result.stats.total_size() > 0);
}
