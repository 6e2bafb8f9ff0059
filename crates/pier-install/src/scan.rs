//! Import scanning.
//!
//! Turns loaded source text into install targets. Phase 1 parses the whole
//! module with oxc; `.jsx`/`.tsx` sources skip it because the plain-ESM
//! grammar rejects JSX. Phase 2 is the fallback for anything phase 1 cannot
//! handle: strip comments, regex-extract just the import statements, and
//! re-parse those in isolation.

use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Expression, ImportDeclarationSpecifier, ModuleDeclaration, ModuleExportName,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

use crate::aggregate::InstallTarget;
use crate::load::LoadedSource;
use crate::resolve::is_valid_package_name;
use crate::{InstallError, Result};

/// Syntactic class of a specifier as written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Package or package subpath (`react`, `@scope/pkg/sub`).
    Bare,
    /// `./` or `../` prefixed.
    Relative,
    /// Rooted filesystem path.
    AbsolutePath,
    /// Contains a scheme (`https://…`).
    Url,
}

/// Classify specifier text, or `None` for text that matches no recognized
/// class (a `#`-prefixed subpath import, a digit-leading name). The scanner
/// drops unclassifiable specifiers.
pub fn classify_specifier(specifier: &str) -> Option<SpecifierKind> {
    if specifier.contains("://") {
        Some(SpecifierKind::Url)
    } else if specifier.starts_with("./") || specifier.starts_with("../") {
        Some(SpecifierKind::Relative)
    } else if specifier.starts_with('/') {
        Some(SpecifierKind::AbsolutePath)
    } else if specifier
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '@')
    {
        Some(SpecifierKind::Bare)
    } else {
        None
    }
}

/// One import as found in source, before target aggregation.
#[derive(Debug, Clone, Default)]
struct ScannedImport {
    specifier: String,
    dynamic: bool,
    type_only: bool,
    default: bool,
    namespace: bool,
    named: Vec<String>,
}

/// Scan one loaded source for install targets.
pub fn scan_imports(source: &LoadedSource) -> Result<Vec<InstallTarget>> {
    let skip_phase_one = matches!(source.extension.as_str(), "jsx" | "tsx");
    let typescript = matches!(source.extension.as_str(), "ts" | "tsx");

    let imports = if skip_phase_one {
        None
    } else {
        lex_module(&source.contents, typescript)
    };

    let imports = match imports {
        Some(imports) => imports,
        None => {
            let stripped = strip_comments(&source.contents);
            let statements = extract_import_statements(&stripped);
            // Type-only statements survive extraction, so re-lex with the
            // TS grammar regardless of the original extension.
            lex_module(&statements.join("\n"), true).ok_or_else(|| InstallError::ParseFailure {
                path: source.path.clone(),
            })?
        }
    };

    Ok(imports.into_iter().filter_map(into_target).collect())
}

/// Convert a scanned import into an install target, applying the drop rules:
/// type-only imports, Babel macros, and specifiers that are neither bare nor
/// a `web_modules/` reference.
fn into_target(import: ScannedImport) -> Option<InstallTarget> {
    static MACRO_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[./]macro(\.js)?$").unwrap());

    if import.type_only {
        return None;
    }

    let specifier = to_web_specifier(&import.specifier)?;
    if MACRO_RE.is_match(&specifier) {
        return None;
    }

    let all = import.dynamic
        || (!import.default && !import.namespace && import.named.is_empty());
    Some(InstallTarget {
        specifier,
        all,
        default: import.default,
        namespace: import.namespace,
        named: import.named.into_iter().collect(),
    })
}

/// Map raw specifier text to the specifier to install, or `None` to drop.
///
/// Bare specifiers pass through. Anything else only survives if it points
/// back into the output namespace (`…/web_modules/<remainder>`), in which
/// case the remainder names the installed module.
pub fn to_web_specifier(raw: &str) -> Option<String> {
    if matches!(classify_specifier(raw), Some(SpecifierKind::Bare)) {
        return Some(raw.to_string());
    }

    let without_query = raw.split('?').next().unwrap_or(raw);
    let idx = without_query.find("web_modules/")?;
    let remainder = &without_query[idx + "web_modules/".len()..];
    let stripped = remainder
        .strip_suffix(".js")
        .or_else(|| remainder.strip_suffix(".mjs"))
        .unwrap_or(remainder);
    if is_valid_package_name(stripped) {
        Some(stripped.to_string())
    } else {
        Some(remainder.to_string())
    }
}

/// Phase-1 lexer: full-module parse with oxc.
///
/// Returns `None` when the parse fails; the caller falls through to the
/// regex-based extraction.
fn lex_module(source: &str, typescript: bool) -> Option<Vec<ScannedImport>> {
    let allocator = Allocator::default();
    let source_type = if typescript {
        SourceType::ts()
    } else {
        SourceType::mjs()
    };
    let ret = Parser::new(&allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return None;
    }

    let mut imports = Vec::new();

    for stmt in &ret.program.body {
        let Some(ModuleDeclaration::ImportDeclaration(import)) = stmt.as_module_declaration()
        else {
            continue;
        };

        let mut scanned = ScannedImport {
            specifier: import.source.value.to_string(),
            type_only: import.import_kind.is_type(),
            ..ScannedImport::default()
        };

        if let Some(specifiers) = &import.specifiers {
            for specifier in specifiers {
                match specifier {
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => {
                        scanned.default = true;
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                        scanned.namespace = true;
                    }
                    ImportDeclarationSpecifier::ImportSpecifier(named) => {
                        if named.import_kind.is_type() {
                            continue;
                        }
                        // `as` renames are local detail; the imported name is
                        // what matters downstream.
                        let imported = match &named.imported {
                            ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
                            ModuleExportName::IdentifierReference(ident) => {
                                ident.name.to_string()
                            }
                            ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
                        };
                        scanned.named.push(imported);
                    }
                }
            }
        }

        imports.push(scanned);
    }

    let mut collector = DynamicImportCollector {
        found: &mut imports,
    };
    collector.visit_program(&ret.program);

    Some(imports)
}

/// List every dependency specifier of an ES module: static imports,
/// re-exports, and literal dynamic imports, in source order, deduplicated.
///
/// Used by the engine when crawling a package's internal graph; application
/// scanning goes through [`scan_imports`] instead.
pub(crate) fn module_dependencies(source: &str) -> Option<Vec<String>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return None;
    }

    let mut specifiers: Vec<String> = Vec::new();
    let mut push = |specifier: String| {
        if !specifiers.contains(&specifier) {
            specifiers.push(specifier);
        }
    };

    for stmt in &ret.program.body {
        match stmt.as_module_declaration() {
            Some(ModuleDeclaration::ImportDeclaration(import)) => {
                if !import.import_kind.is_type() {
                    push(import.source.value.to_string());
                }
            }
            Some(ModuleDeclaration::ExportNamedDeclaration(export)) => {
                if let Some(src) = &export.source {
                    push(src.value.to_string());
                }
            }
            Some(ModuleDeclaration::ExportAllDeclaration(export)) => {
                push(export.source.value.to_string());
            }
            _ => {}
        }
    }

    let mut dynamic = Vec::new();
    let mut collector = DynamicImportCollector {
        found: &mut dynamic,
    };
    collector.visit_program(&ret.program);
    for import in dynamic {
        push(import.specifier);
    }

    Some(specifiers)
}

/// Does this ES module have a default export (declaration or re-export)?
pub(crate) fn module_has_default_export(source: &str) -> bool {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return false;
    }
    ret.program.body.iter().any(|stmt| match stmt.as_module_declaration() {
        Some(ModuleDeclaration::ExportDefaultDeclaration(_)) => true,
        Some(ModuleDeclaration::ExportNamedDeclaration(export)) => {
            export.specifiers.iter().any(|spec| {
                matches!(&spec.exported, ModuleExportName::IdentifierName(ident) if ident.name == "default")
                    || matches!(&spec.exported, ModuleExportName::IdentifierReference(ident) if ident.name == "default")
            })
        }
        _ => false,
    })
}

/// Collects `import(…)` expressions with literal arguments. Non-literal
/// arguments and `import.meta` never reach this visitor's accept path, which
/// is exactly the drop behavior the scanner wants.
struct DynamicImportCollector<'b> {
    found: &'b mut Vec<ScannedImport>,
}

impl<'a> Visit<'a> for DynamicImportCollector<'_> {
    fn visit_import_expression(&mut self, expr: &oxc_ast::ast::ImportExpression<'a>) {
        if let Some(specifier) = literal_text(&expr.source) {
            self.found.push(ScannedImport {
                specifier,
                dynamic: true,
                ..ScannedImport::default()
            });
        }
        walk::walk_import_expression(self, expr);
    }
}

/// Literal string value of an expression: quoted strings and
/// interpolation-free template literals only.
fn literal_text(expr: &Expression<'_>) -> Option<String> {
    match expr {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => {
            let quasi = tpl.quasis.first()?;
            Some(
                quasi
                    .value
                    .cooked
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| quasi.value.raw.to_string()),
            )
        }
        _ => None,
    }
}

/// Remove comments without disturbing string or template contents.
fn strip_comments(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Single,
        Double,
        Template,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::Block;
                }
                '\'' => {
                    state = State::Single;
                    out.push(c);
                }
                '"' => {
                    state = State::Double;
                    out.push(c);
                }
                '`' => {
                    state = State::Template;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    out.push(c);
                    state = State::Code;
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
            State::Single | State::Double | State::Template => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if (state == State::Single && c == '\'')
                    || (state == State::Double && c == '"')
                    || (state == State::Template && c == '`')
                {
                    state = State::Code;
                }
            }
        }
    }

    out
}

/// Pull out just the import-looking statements from comment-stripped source.
fn extract_import_statements(source: &str) -> Vec<String> {
    static STATIC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"import\s+(?:type\s+)?(?:[\w*$\s{},]+?\s+from\s+)?["'][^"'\n]+["']"#).unwrap()
    });
    static DYNAMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"import\s*\(\s*(?:"[^"\n]*"|'[^'\n]*'|`[^`\n]*`)\s*\)"#).unwrap()
    });

    let mut statements: Vec<String> = STATIC_RE
        .find_iter(source)
        .map(|m| m.as_str().to_string())
        .collect();
    statements.extend(
        DYNAMIC_RE
            .find_iter(source)
            .map(|m| m.as_str().to_string()),
    );
    statements
}
