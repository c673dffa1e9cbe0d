//! Rule-level CSS processing: purge, optimize, minify.
//!
//! The purger keeps a rule when at least one of its selectors references
//! only identifiers (tags, classes, ids) that occur in the paired HTML
//! document. Matching is token-based on the raw HTML text, which covers
//! tag names, `class="..."` values and `id="..."` values without an HTML
//! parse. Conditional group rules (`@media`, `@supports`) are purged
//! recursively and dropped when emptied; other at-rules (`@keyframes`,
//! `@font-face`, `@import`, ...) are kept verbatim — their usage cannot be
//! judged from markup alone.
//!
//! `optimize` is the non-compressing cleanup pass (comments out, blank
//! runs collapsed) and `minify` is the whitespace-normalizing compressor
//! applied before the `.min` rename.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CssError {
    #[error("CSS parse error: {0}")]
    Parse(String),
}

/// One parsed stylesheet node.
#[derive(Debug, PartialEq)]
enum Node {
    /// `selector { declarations }`
    Rule { selector: String, body: String },
    /// `@media ... { nested nodes }` / `@supports ...`
    Conditional { prelude: String, children: Vec<Node> },
    /// Any other at-rule with a block, kept verbatim.
    AtBlock { prelude: String, body: String },
    /// Block-less at-rule, e.g. `@import url(...)`.
    AtStatement(String),
}

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_-]+").unwrap());
static SELECTOR_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::?[A-Za-z-]+(\([^)]*\))?|\[[^\]]*\]").unwrap());
static BLANK_RUNS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Identifier tokens present in an HTML document, the reference set for
/// purging.
pub fn html_tokens(html: &str) -> HashSet<String> {
    IDENT_RE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parse a stylesheet into top-level nodes. Comments are discarded first.
fn parse(css: &str) -> Result<Vec<Node>, CssError> {
    let css = COMMENT_RE.replace_all(css, "");
    parse_nodes(&css)
}

fn parse_nodes(css: &str) -> Result<Vec<Node>, CssError> {
    let bytes = css.as_bytes();
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // Skip leading whitespace.
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let start = i;
        while i < bytes.len() && bytes[i] != b'{' && bytes[i] != b';' {
            i += 1;
        }
        let prelude = css[start..i].trim().to_string();

        if i >= bytes.len() {
            if !prelude.is_empty() {
                return Err(CssError::Parse(format!(
                    "dangling prelude without block: {prelude}"
                )));
            }
            break;
        }

        if bytes[i] == b';' {
            i += 1;
            if !prelude.is_empty() {
                nodes.push(Node::AtStatement(prelude));
            }
            continue;
        }

        // bytes[i] == b'{' — read the balanced block.
        let body_start = i + 1;
        let mut depth = 1usize;
        i += 1;
        while i < bytes.len() && depth > 0 {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err(CssError::Parse("unbalanced braces".into()));
        }
        let body = css[body_start..i - 1].trim().to_string();

        if let Some(kind) = prelude.strip_prefix('@') {
            let name = kind.split_whitespace().next().unwrap_or("");
            if name == "media" || name == "supports" {
                nodes.push(Node::Conditional {
                    prelude,
                    children: parse_nodes(&body)?,
                });
            } else {
                nodes.push(Node::AtBlock { prelude, body });
            }
        } else {
            nodes.push(Node::Rule {
                selector: prelude,
                body,
            });
        }
    }
    Ok(nodes)
}

/// Whether one selector is satisfied by the HTML token set: every tag,
/// class and id identifier it names must occur in the document.
fn selector_used(selector: &str, used: &HashSet<String>) -> bool {
    // Selectors with no identifiers at all (`*`) are kept.
    let stripped = SELECTOR_NOISE_RE.replace_all(selector, " ");
    IDENT_RE
        .find_iter(&stripped)
        .all(|m| used.contains(m.as_str()))
}

fn render(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Rule { selector, body } => {
                out.push_str(selector);
                out.push_str(" {\n");
                out.push_str(body);
                out.push_str("\n}\n");
            }
            Node::Conditional { prelude, children } => {
                out.push_str(prelude);
                out.push_str(" {\n");
                render(children, out);
                out.push_str("}\n");
            }
            Node::AtBlock { prelude, body } => {
                out.push_str(prelude);
                out.push_str(" {\n");
                out.push_str(body);
                out.push_str("\n}\n");
            }
            Node::AtStatement(s) => {
                out.push_str(s);
                out.push_str(";\n");
            }
        }
    }
}

fn purge_nodes(nodes: Vec<Node>, used: &HashSet<String>) -> Vec<Node> {
    let mut kept = Vec::new();
    for node in nodes {
        match node {
            Node::Rule { selector, body } => {
                let survivors: Vec<&str> = selector
                    .split(',')
                    .map(str::trim)
                    .filter(|s| selector_used(s, used))
                    .collect();
                if !survivors.is_empty() {
                    kept.push(Node::Rule {
                        selector: survivors.join(", "),
                        body,
                    });
                }
            }
            Node::Conditional { prelude, children } => {
                let children = purge_nodes(children, used);
                if !children.is_empty() {
                    kept.push(Node::Conditional { prelude, children });
                }
            }
            other => kept.push(other),
        }
    }
    kept
}

/// Remove rules whose selectors reference identifiers absent from the
/// HTML token set.
pub fn purge(css: &str, used: &HashSet<String>) -> Result<String, CssError> {
    let nodes = parse(css)?;
    let kept = purge_nodes(nodes, used);
    let mut out = String::new();
    render(&kept, &mut out);
    Ok(out)
}

/// Non-compressing cleanup: strip comments, trailing spaces, blank runs.
pub fn optimize(css: &str) -> String {
    let css = COMMENT_RE.replace_all(css, "");
    let trimmed: Vec<&str> = css.lines().map(str::trim_end).collect();
    let joined = trimmed.join("\n");
    BLANK_RUNS_RE.replace_all(&joined, "\n\n").trim().to_string() + "\n"
}

/// Whitespace-normalizing compression (the `.min` variant's content).
pub fn minify(css: &str) -> String {
    let css = COMMENT_RE.replace_all(css, "");
    let mut out = String::with_capacity(css.len());
    let mut last_space = false;
    for ch in css.chars() {
        if ch.is_whitespace() {
            last_space = true;
            continue;
        }
        if last_space {
            // Whitespace is significant only between two identifier-ish
            // characters (descendant combinators, `and (` in media queries).
            let prev = out.chars().last().unwrap_or('{');
            if !matches!(prev, '{' | '}' | ';' | ':' | ',' | '(' | '>')
                && !matches!(ch, '{' | '}' | ';' | ':' | ',' | ')' | '>')
            {
                out.push(' ');
            }
            last_space = false;
        }
        out.push(ch);
    }
    out.replace(";}", "}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<body><button class="btn primary" id="send">Go</button></body>"#;

    fn used() -> HashSet<String> {
        html_tokens(HTML)
    }

    #[test]
    fn used_selectors_survive() {
        let css = ".btn { color: red; }\n.unused { color: blue; }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains(".btn"));
        assert!(!out.contains(".unused"));
    }

    #[test]
    fn tag_and_id_selectors_match_tokens() {
        let css = "button { x: y; }\n#send { x: y; }\n#other { x: y; }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains("button"));
        assert!(out.contains("#send"));
        assert!(!out.contains("#other"));
    }

    #[test]
    fn selector_list_is_pruned_not_dropped() {
        let css = ".btn, .unused { color: red; }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains(".btn"));
        assert!(!out.contains(".unused"));
        assert!(out.contains("color: red"));
    }

    #[test]
    fn emptied_media_block_is_dropped() {
        let css = "@media (min-width: 600px) { .unused { a: b; } }";
        let out = purge(css, &used()).unwrap();
        assert!(!out.contains("@media"));
    }

    #[test]
    fn media_block_with_survivor_is_kept() {
        let css = "@media (min-width: 600px) { .btn { a: b; } .unused { a: b; } }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains("@media (min-width: 600px)"));
        assert!(out.contains(".btn"));
        assert!(!out.contains(".unused"));
    }

    #[test]
    fn keyframes_and_font_face_kept_verbatim() {
        let css = "@keyframes spin { from { r: 0 } to { r: 1 } }\n@font-face { font-family: X; }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains("@keyframes spin"));
        assert!(out.contains("@font-face"));
    }

    #[test]
    fn pseudo_classes_do_not_affect_matching() {
        let css = ".btn:hover { a: b; }\n.btn::after { a: b; }";
        let out = purge(css, &used()).unwrap();
        assert!(out.contains(":hover"));
        assert!(out.contains("::after"));
    }

    #[test]
    fn universal_selector_kept() {
        let out = purge("* { box-sizing: border-box; }", &used()).unwrap();
        assert!(out.contains('*'));
    }

    #[test]
    fn unbalanced_braces_is_parse_error() {
        assert!(purge(".a { color: red;", &used()).is_err());
    }

    #[test]
    fn minify_collapses_whitespace() {
        let css = ".btn {\n    color : red ;\n}\n";
        assert_eq!(minify(css), ".btn{color:red}");
    }

    #[test]
    fn minify_keeps_descendant_combinator_space() {
        let out = minify(".nav a { color: red; }");
        assert!(out.contains(".nav a{"));
    }

    #[test]
    fn optimize_strips_comments_but_not_structure() {
        let css = "/* note */\n.btn {\n  color: red;\n}\n\n\n\n.x { a: b; }\n";
        let out = optimize(css);
        assert!(!out.contains("note"));
        assert!(out.contains(".btn {\n  color: red;\n}"));
        assert!(!out.contains("\n\n\n"));
    }
}
