//! Tag-level SVG cleanup for sprite building and image optimization.
//!
//! This is not a general-purpose SVG minifier — it performs exactly the
//! normalization the sprite pipeline needs, at the text level:
//!
//! - drop the XML declaration, DOCTYPE and comments;
//! - strip presentation attributes per sprite preset (`mono` icons lose
//!   `fill`/`stroke*` so CSS can color them through `currentColor`;
//!   `multi` icons keep their own palette);
//! - drop `width`/`height` from the root so sprites scale via `viewBox`.
//!
//! Parsing is deliberately shallow: the root `<svg>` element's attributes
//! and inner markup are extracted textually. Malformed input (no root
//! element) is a parse error the caller maps to a per-file plugin error.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvgError {
    #[error("SVG parse error: {0}")]
    Parse(String),
}

/// Named SVGO-style preset for sprite icon optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpritePreset {
    /// Single-color icons: strip `fill`/`stroke*` so the consumer styles
    /// them via CSS.
    Mono,
    /// Multi-color icons: keep the palette, strip only class noise.
    Multi,
}

impl SpritePreset {
    pub fn name(&self) -> &'static str {
        match self {
            SpritePreset::Mono => "mono",
            SpritePreset::Multi => "multi",
        }
    }
}

/// Root `<svg>` element split into attributes and inner markup.
#[derive(Debug)]
pub struct SvgRoot {
    pub attrs: Vec<(String, String)>,
    pub inner: String,
}

static ROOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b([^>]*)>(.*)</svg\s*>").unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#).unwrap());
static XML_DECL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());
static DOCTYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!DOCTYPE.*?>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static MONO_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?:class|data-name|fill|stroke[-a-zA-Z]*)\s*=\s*"[^"]*""#).unwrap()
});
static MULTI_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+(?:class|data-name)\s*=\s*"[^"]*""#).unwrap());

/// Remove declaration/DOCTYPE/comment noise.
fn strip_noise(content: &str) -> String {
    let s = XML_DECL_RE.replace_all(content, "");
    let s = DOCTYPE_RE.replace_all(&s, "");
    COMMENT_RE.replace_all(&s, "").trim().to_string()
}

/// Extract the root `<svg>` element.
pub fn parse_root(content: &str) -> Result<SvgRoot, SvgError> {
    let caps = ROOT_RE
        .captures(content)
        .ok_or_else(|| SvgError::Parse("no root <svg> element found".into()))?;
    let attrs = ATTR_RE
        .captures_iter(&caps[1])
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    Ok(SvgRoot {
        attrs,
        inner: caps[2].trim().to_string(),
    })
}

/// Serialize a root element back to markup.
fn render_root(attrs: &[(String, String)], inner: &str) -> String {
    let mut open = String::from("<svg");
    for (name, value) in attrs {
        open.push(' ');
        open.push_str(name);
        open.push_str("=\"");
        open.push_str(value);
        open.push('"');
    }
    format!("{open}>{inner}</svg>")
}

/// Optimize one icon for sprite inclusion per the preset.
///
/// Removes dimension attributes from the root (scaling is `viewBox`'s job)
/// and preset-specific presentation attributes from every element.
pub fn optimize_icon(content: &str, preset: SpritePreset) -> Result<String, SvgError> {
    let cleaned = strip_noise(content);
    let root = parse_root(&cleaned)?;

    let strip_re: &Regex = match preset {
        SpritePreset::Mono => &MONO_ATTR_RE,
        SpritePreset::Multi => &MULTI_ATTR_RE,
    };

    let attrs: Vec<(String, String)> = root
        .attrs
        .into_iter()
        .filter(|(name, _)| {
            let n = name.as_str();
            let preset_stripped = match preset {
                SpritePreset::Mono => {
                    n == "class" || n == "data-name" || n == "fill" || n.starts_with("stroke")
                }
                SpritePreset::Multi => n == "class" || n == "data-name",
            };
            !(preset_stripped || n == "width" || n == "height")
        })
        .collect();

    let inner = strip_re.replace_all(&root.inner, "").to_string();
    Ok(render_root(&attrs, &inner))
}

/// Light standalone optimization used by the image optimizer for `.svg`
/// assets outside the sprite trees: noise removal plus a structural sanity
/// check. The document keeps its dimensions and palette.
pub fn optimize_standalone(content: &str) -> Result<String, SvgError> {
    let cleaned = strip_noise(content);
    // Validate structure; malformed SVG is a per-file error upstream.
    parse_root(&cleaned)?;
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICON: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported from editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" class="icon">
  <path fill="#f00" stroke="#000" stroke-width="2" d="M0 0h24v24H0z"/>
</svg>"##;

    #[test]
    fn parse_root_extracts_attrs_and_inner() {
        let root = parse_root(r#"<svg viewBox="0 0 8 8"><path d="M0 0"/></svg>"#).unwrap();
        assert_eq!(
            root.attrs,
            vec![("viewBox".to_string(), "0 0 8 8".to_string())]
        );
        assert_eq!(root.inner, r#"<path d="M0 0"/>"#);
    }

    #[test]
    fn parse_root_rejects_non_svg() {
        assert!(parse_root("<div>nope</div>").is_err());
    }

    #[test]
    fn mono_preset_strips_fill_and_stroke() {
        let out = optimize_icon(ICON, SpritePreset::Mono).unwrap();
        assert!(!out.contains("fill="));
        assert!(!out.contains("stroke"));
        assert!(!out.contains("class="));
        assert!(out.contains(r#"d="M0 0h24v24H0z""#));
    }

    #[test]
    fn multi_preset_keeps_palette() {
        let out = optimize_icon(ICON, SpritePreset::Multi).unwrap();
        assert!(out.contains(r##"fill="#f00""##));
        assert!(out.contains("stroke-width"));
        assert!(!out.contains("class="));
    }

    #[test]
    fn dimensions_removed_viewbox_kept() {
        for preset in [SpritePreset::Mono, SpritePreset::Multi] {
            let out = optimize_icon(ICON, preset).unwrap();
            assert!(!out.contains("width=\"24\""));
            assert!(!out.contains("height=\"24\""));
            assert!(out.contains("viewBox=\"0 0 24 24\""));
        }
    }

    #[test]
    fn noise_is_stripped() {
        let out = optimize_icon(ICON, SpritePreset::Mono).unwrap();
        assert!(!out.contains("<?xml"));
        assert!(!out.contains("<!--"));
    }

    #[test]
    fn standalone_keeps_dimensions() {
        let out = optimize_standalone(ICON).unwrap();
        assert!(out.contains("width=\"24\""));
        assert!(!out.contains("<?xml"));
    }

    #[test]
    fn standalone_rejects_malformed() {
        assert!(optimize_standalone("not svg at all").is_err());
    }
}
