//! `<img>` to `<picture>` rewriting for pages.
//!
//! Each eligible `<img>` tag gains a `<picture>` wrapper with a WebP
//! `<source>` (and a retina-aware fallback `<source>` for JPEG/PNG when an
//! `@2x` variant exists). The rewrite is existence-gated: a source element
//! is emitted only when the corresponding file is actually present under
//! the destination root, so the image pipe must run before the HTML pipe.
//!
//! Processing is line-based. Lines inside an existing `<picture>` element
//! are left untouched — hand-written picture markup wins.

use crate::pipeline::{Stage, StageOutput};
use crate::record::{normalize, Contents, FileRecord, Normalized, TransformError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const PLUGIN: &str = "picture";

static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img([^>]*?)src="(\S+?)"([^>]*?)>"#).unwrap());

/// Wraps `<img>` tags in `<picture>` with WebP and retina sources.
pub struct PictureTagRewriter {
    /// Destination root the image pipe wrote into; URL existence checks
    /// resolve against it.
    root: PathBuf,
    retina_size: String,
    retina_suffix: String,
}

impl PictureTagRewriter {
    pub fn new(root: impl Into<PathBuf>, retina_size: &str) -> Self {
        Self {
            root: root.into(),
            retina_size: retina_size.to_string(),
            retina_suffix: format!("@{retina_size}"),
        }
    }

    /// Resolve a page-relative URL against the destination root: leading
    /// `./` and `../` segments are dropped because pages live two levels
    /// deep under the root.
    fn exists(&self, url: &str) -> bool {
        let mut rel = url;
        loop {
            if let Some(rest) = rel.strip_prefix("./") {
                rel = rest;
            } else if let Some(rest) = rel.strip_prefix("../") {
                rel = rest;
            } else {
                break;
            }
        }
        self.root.join(rel).is_file()
    }

    fn rewrite_img(&self, tag: &str, src: &str) -> Option<String> {
        let dot = src.rfind('.')?;
        let (stem, ext) = (&src[..dot], &src[dot + 1..]);
        let ext_lower = ext.to_ascii_lowercase();
        if ext_lower == "svg" || ext_lower == "gif" {
            return None;
        }

        let webp = format!("{stem}.webp");
        if !self.exists(&webp) {
            return None;
        }

        let webp_2x = format!("{stem}{}.webp", self.retina_suffix);
        let webp_srcset = if self.exists(&webp_2x) {
            format!("{webp} 1x, {webp_2x} {}", self.retina_size)
        } else {
            webp
        };
        let mut sources = format!(r#"<source srcset="{webp_srcset}" type="image/webp">"#);

        // Retina fallback for the original format, only when the @2x
        // variant was actually produced.
        let fallback_type = match ext_lower.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            _ => None,
        };
        if let Some(mime) = fallback_type {
            let orig_2x = format!("{stem}{}.{ext}", self.retina_suffix);
            if self.exists(&orig_2x) {
                sources.push_str(&format!(
                    r#"<source srcset="{src} 1x, {orig_2x} {}" type="{mime}">"#,
                    self.retina_size
                ));
            }
        }

        Some(format!("<picture>{sources}{tag}</picture>"))
    }

    fn process(&self, path: &Path, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut in_picture = false;

        // Split keeping each line's own terminator (`\n` or `\r\n`), so an
        // untouched document comes out byte-identical.
        for segment in html.split_inclusive('\n') {
            let body_len = segment.trim_end_matches(['\r', '\n']).len();
            let (line, ending) = segment.split_at(body_len);

            let lower = line.to_ascii_lowercase();
            if lower.contains("<picture") {
                in_picture = true;
            }
            if in_picture {
                out.push_str(segment);
                if lower.contains("</picture") {
                    in_picture = false;
                }
                continue;
            }

            if lower.contains("<img") && !IMG_RE.is_match(line) {
                eprintln!(
                    "at {PLUGIN}: unprocessed <img> in {} — check image file names \
                     for spaces or non-Latin characters",
                    path.display()
                );
            }

            let replaced = IMG_RE.replace_all(line, |caps: &regex::Captures| {
                let tag = &caps[0];
                let src = &caps[2];
                self.rewrite_img(tag, src).unwrap_or_else(|| tag.to_string())
            });
            out.push_str(&replaced);
            out.push_str(ending);
        }
        out
    }
}

impl Stage for PictureTagRewriter {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, mut record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize(PLUGIN, &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }
        if record.extension().as_deref() != Some("html") {
            return Ok(StageOutput::One(record));
        }
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let html = std::str::from_utf8(bytes)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        let out = self.process(&record.path, html);
        record.contents = Contents::Buffer(out.into_bytes());
        Ok(StageOutput::One(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dist_with(files: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for f in files {
            let p = tmp.path().join(f);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, "x").unwrap();
        }
        tmp
    }

    fn run(rewriter: &mut PictureTagRewriter, html: &str) -> String {
        let out = rewriter
            .apply(FileRecord::from_bytes("index.html", html.as_bytes().to_vec()))
            .unwrap();
        let StageOutput::One(rec) = out else {
            panic!("expected one record");
        };
        String::from_utf8(rec.bytes().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn wraps_img_when_webp_exists() {
        let dist = dist_with(&["assets/img/hero.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = run(&mut rw, r#"<img class="hero" src="../../assets/img/hero.jpg" alt="">"#);
        assert!(out.starts_with("<picture><source srcset=\"../../assets/img/hero.webp\" type=\"image/webp\">"));
        assert!(out.contains(r#"<img class="hero" src="../../assets/img/hero.jpg" alt="">"#));
        assert!(out.ends_with("</picture>"));
    }

    #[test]
    fn missing_webp_leaves_img_alone() {
        let dist = dist_with(&[]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let html = r#"<img src="../../assets/img/hero.jpg">"#;
        assert_eq!(run(&mut rw, html), html);
    }

    #[test]
    fn svg_and_gif_are_skipped() {
        let dist = dist_with(&["assets/img/logo.webp", "assets/img/anim.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        for html in [
            r#"<img src="../../assets/img/logo.svg">"#,
            r#"<img src="../../assets/img/anim.gif">"#,
        ] {
            assert_eq!(run(&mut rw, html), html);
        }
    }

    #[test]
    fn retina_webp_joins_srcset() {
        let dist = dist_with(&["assets/img/hero.webp", "assets/img/hero@2x.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = run(&mut rw, r#"<img src="../../assets/img/hero.jpg">"#);
        assert!(out.contains(
            r#"srcset="../../assets/img/hero.webp 1x, ../../assets/img/hero@2x.webp 2x""#
        ));
    }

    #[test]
    fn jpeg_fallback_source_requires_retina_variant() {
        // Without @2x jpg: only the webp source.
        let dist = dist_with(&["assets/img/hero.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = run(&mut rw, r#"<img src="../../assets/img/hero.jpg">"#);
        assert!(!out.contains("image/jpeg"));

        // With @2x jpg: fallback source appears.
        let dist = dist_with(&["assets/img/hero.webp", "assets/img/hero@2x.jpg"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = run(&mut rw, r#"<img src="../../assets/img/hero.jpg">"#);
        assert!(out.contains(
            r#"<source srcset="../../assets/img/hero.jpg 1x, ../../assets/img/hero@2x.jpg 2x" type="image/jpeg">"#
        ));
    }

    #[test]
    fn existing_picture_markup_is_untouched() {
        let dist = dist_with(&["assets/img/hero.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let html = "<picture>\n<img src=\"../../assets/img/hero.jpg\">\n</picture>";
        assert_eq!(run(&mut rw, html), html);
    }

    #[test]
    fn crlf_line_endings_survive() {
        // Untouched document: byte-identical output.
        let dist = dist_with(&[]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let html = "<p>a</p>\r\n<img src=\"../../assets/img/hero.jpg\">\r\n<p>b</p>\r\n";
        assert_eq!(run(&mut rw, html), html);

        // Rewritten document: the rewrite lands, the endings stay CRLF.
        let dist = dist_with(&["assets/img/hero.webp"]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = run(&mut rw, html);
        assert!(out.contains("<picture>"));
        assert!(out.ends_with("<p>b</p>\r\n"));
        assert!(!out.contains("\n<img"));
        assert_eq!(out.matches("\r\n").count(), 3);
    }

    #[test]
    fn non_html_records_pass_through() {
        let dist = dist_with(&[]);
        let mut rw = PictureTagRewriter::new(dist.path(), "2x");
        let out = rw
            .apply(FileRecord::from_bytes("a.css", b".x{}".to_vec()))
            .unwrap();
        assert!(matches!(out, StageOutput::One(r) if r.file_name() == "a.css"));
    }
}
