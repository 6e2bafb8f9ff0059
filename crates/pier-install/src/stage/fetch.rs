//! Rewrite `fetch()` calls that target bundled assets.
//!
//! An asset the installer copies into the output directory moves to a new
//! URL; fetches of the original path are pointed at the copy so they keep
//! working at runtime.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

static FETCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bfetch\(\s*(["'])([^"']+)["']"#).unwrap());

pub fn rewrite_fetch(source: &str, asset_urls: &FxHashMap<String, String>) -> String {
    if asset_urls.is_empty() {
        return source.to_string();
    }
    FETCH_RE
        .replace_all(source, |caps: &Captures<'_>| {
            let quote = &caps[1];
            let argument = &caps[2];
            match asset_urls.get(argument) {
                Some(url) => format!("fetch({quote}{url}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_known_asset_urls() {
        let urls = FxHashMap::from_iter([(
            "pkg/data.json".to_string(),
            "/web_modules/pkg/data.json".to_string(),
        )]);
        let out = rewrite_fetch("const r = await fetch('pkg/data.json');", &urls);
        assert_eq!(out, "const r = await fetch('/web_modules/pkg/data.json');");
    }

    #[test]
    fn unknown_arguments_untouched() {
        let urls = FxHashMap::from_iter([("a".to_string(), "b".to_string())]);
        let src = "fetch('https://api.example.com/users')";
        assert_eq!(rewrite_fetch(src, &urls), src);
    }
}
