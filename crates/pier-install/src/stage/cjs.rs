//! CommonJS to ES-module interop.
//!
//! Detection is conservative: a module is wrapped only when it shows CJS
//! markers and no ESM syntax at all. The wrapper hoists literal `require()`
//! calls to imports, runs the body in a module-scope closure, and re-exports
//! `module.exports` as the default plus any statically detected named
//! assignments.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

static ESM_SYNTAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s|import\(|export\s)").unwrap()
});

static CJS_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bmodule\.exports\b|\bexports\.[A-Za-z_$]|\brequire\s*\(").unwrap()
});

static REQUIRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap());

static NAMED_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:module\.)?exports\.([A-Za-z_$][A-Za-z0-9_$]*)\s*=").unwrap()
});

/// Does this source look like CommonJS?
pub fn is_commonjs(source: &str) -> bool {
    !ESM_SYNTAX_RE.is_match(source) && CJS_MARKER_RE.is_match(source)
}

/// Named properties assigned onto the export object, in source order,
/// deduplicated. `default` is excluded; it is always the wrapped object.
pub fn detect_named_exports(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for capture in NAMED_ASSIGN_RE.captures_iter(source) {
        let name = capture[1].to_string();
        if name != "default" && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Rewrite a CommonJS module as an ES module.
pub fn wrap_commonjs(source: &str) -> String {
    // Hoist literal requires into imports. Each distinct specifier gets a
    // namespace import and a default-preferring binding.
    let mut specifiers: Vec<String> = Vec::new();
    let body = REQUIRE_RE.replace_all(source, |caps: &regex::Captures<'_>| {
        let specifier = caps[1].to_string();
        let index = match specifiers.iter().position(|s| s == &specifier) {
            Some(index) => index,
            None => {
                specifiers.push(specifier);
                specifiers.len() - 1
            }
        };
        format!("__pier_import_{index}")
    });

    let mut out = String::new();
    for (index, specifier) in specifiers.iter().enumerate() {
        let _ = writeln!(
            out,
            "import * as __pier_ns_{index} from {};",
            serde_json::to_string(specifier).expect("string serializes")
        );
        let _ = writeln!(
            out,
            "const __pier_import_{index} = __pier_ns_{index}.default !== undefined ? __pier_ns_{index}.default : __pier_ns_{index};"
        );
    }

    let _ = writeln!(out, "var module = {{ exports: {{}} }};");
    let _ = writeln!(out, "var exports = module.exports;");
    let _ = writeln!(out, "(function (module, exports) {{");
    out.push_str(&body);
    let _ = writeln!(out, "\n}})(module, exports);");
    let _ = writeln!(out, "export default module.exports;");

    for name in detect_named_exports(source) {
        let _ = writeln!(out, "export const {name} = module.exports.{name};");
    }

    out
}
