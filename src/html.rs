//! Page assembly: `@@include` expansion, `@@` placeholder substitution and
//! output tidying.
//!
//! Pages reference shared partials with `@@include("header.html")`; the
//! partial is looked up in the templates directory and may itself include
//! further partials (depth-capped so an include cycle is an error, not a
//! hang). Placeholders like `@@title` are substituted from per-page head
//! data, longest name first so `@@titleLong` never collides with `@@title`.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("include not found: {0}")]
    IncludeNotFound(String),
    #[error("include depth exceeded at {0} (cycle?)")]
    IncludeDepth(String),
    #[error("I/O error reading include {name}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
}

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@@include\(\s*"([^"]+)"\s*\)"#).unwrap());
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<img.*?>").unwrap());
static INNER_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}|\n").unwrap());
static HTML_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BETWEEN_TAGS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

const MAX_INCLUDE_DEPTH: usize = 10;

/// Expand `@@include("name.html")` directives against `templates_dir`,
/// recursively.
pub fn expand_includes(html: &str, templates_dir: &Path) -> Result<String, HtmlError> {
    expand_at_depth(html, templates_dir, 0)
}

fn expand_at_depth(html: &str, templates_dir: &Path, depth: usize) -> Result<String, HtmlError> {
    if !INCLUDE_RE.is_match(html) {
        return Ok(html.to_string());
    }

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in INCLUDE_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(HtmlError::IncludeDepth(name.to_string()));
        }

        let path = templates_dir.join(name);
        if !path.is_file() {
            return Err(HtmlError::IncludeNotFound(name.to_string()));
        }
        let partial = std::fs::read_to_string(&path).map_err(|source| HtmlError::Io {
            name: name.to_string(),
            source,
        })?;
        let expanded = expand_at_depth(&partial, templates_dir, depth + 1)?;

        out.push_str(&html[last..whole.start()]);
        out.push_str(&expanded);
        last = whole.end();
    }
    out.push_str(&html[last..]);
    Ok(out)
}

/// Substitute `@@name` placeholders. Longest names first, so a placeholder
/// that prefixes another cannot clobber it.
pub fn apply_placeholders(html: &str, values: &BTreeMap<String, String>) -> String {
    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut out = html.to_string();
    for key in keys {
        let marker = format!("@@{key}");
        out = out.replace(&marker, &values[key.as_str()]);
    }
    out
}

/// Collapse whitespace runs inside `<img ...>` tags so attribute-per-line
/// source formatting survives the picture rewriter's line-based scan.
pub fn collapse_img_whitespace(html: &str) -> String {
    IMG_TAG_RE
        .replace_all(html, |caps: &regex::Captures| {
            INNER_WS_RE.replace_all(&caps[0], " ").into_owned()
        })
        .into_owned()
}

/// Dev-mode output pass: keep the page readable, just normalize img tags.
pub fn tidy_html(html: &str) -> String {
    collapse_img_whitespace(html)
}

/// Build-mode output pass: drop comments and inter-tag whitespace.
pub fn clean_html(html: &str) -> String {
    let html = collapse_img_whitespace(html);
    let html = HTML_COMMENT_RE.replace_all(&html, "");
    BETWEEN_TAGS_RE.replace_all(&html, "><").trim().to_string()
}
