//! CSS imports as side-effect JS modules.

/// Wrap CSS text in a module that injects a `<style>` tag on first import.
///
/// The default export is the raw CSS string so consumers can also read it.
pub fn css_to_module(css: &str) -> String {
    let literal = serde_json::to_string(css).expect("string serializes");
    format!(
        "const css = {literal};\n\
         if (typeof document !== \"undefined\") {{\n\
         \x20\x20const style = document.createElement(\"style\");\n\
         \x20\x20style.textContent = css;\n\
         \x20\x20document.head.appendChild(style);\n\
         }}\n\
         export default css;\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_css_in_injecting_module() {
        let out = css_to_module("body { color: red; }");
        assert!(out.contains("const css = \"body { color: red; }\";"));
        assert!(out.contains("document.createElement(\"style\")"));
        assert!(out.contains("export default css;"));
    }

    #[test]
    fn quotes_and_newlines_are_escaped() {
        let out = css_to_module("a::before { content: \"x\"; }\n.b {}");
        assert!(out.contains("\\\"x\\\""));
        assert!(out.contains("\\n"));
    }
}
