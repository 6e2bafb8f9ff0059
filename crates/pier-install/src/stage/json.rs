//! JSON modules as ES modules with named exports.

use serde_json::Value;

/// JavaScript reserved words that can never be export identifiers.
const RESERVED_WORDS: [&str; 36] = [
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "while", "yield",
];

/// Convert raw JSON text into an ES module.
///
/// The default export is the whole document, pretty-printed (two-space
/// indent). Top-level object keys that are valid identifiers also become
/// named exports.
pub fn json_to_module(source: &str) -> Result<String, String> {
    let value: Value =
        serde_json::from_str(source).map_err(|e| format!("invalid JSON: {e}"))?;

    let pretty = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    let mut out = format!("const json = {pretty};\nexport default json;\n");

    if let Value::Object(map) = &value {
        for key in map.keys() {
            if is_valid_identifier(key) {
                out.push_str(&format!("export const {key} = json[{}];\n", quote(key)));
            }
        }
    }

    Ok(out)
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    !RESERVED_WORDS.contains(&name)
}

fn quote(key: &str) -> String {
    serde_json::to_string(key).expect("string serializes")
}
