//! Unused-rule purging for per-page stylesheets.
//!
//! Each stylesheet is paired with its page by name: `index.css` (or any
//! `index.*.css` variant) pairs with `index.html`, found anywhere under the
//! HTML source tree. A stylesheet without a pairing page is an error — the
//! convention is one root stylesheet per page, so a miss means a typo.

use crate::css;
use crate::pipeline::{Stage, StageOutput};
use crate::record::{normalize, Contents, FileRecord, Normalized, TransformError};
use crate::util;
use std::path::PathBuf;

const PLUGIN: &str = "cssPurge";

/// Strips rules whose selectors never occur in the paired page.
pub struct CssUnusedRulePurger {
    /// HTML source tree searched (recursively) for the paired page.
    html_dir: PathBuf,
}

impl CssUnusedRulePurger {
    pub fn new(html_dir: impl Into<PathBuf>) -> Self {
        Self {
            html_dir: html_dir.into(),
        }
    }
}

impl Stage for CssUnusedRulePurger {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, mut record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize(PLUGIN, &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }
        if record.extension().as_deref() != Some("css") {
            return Err(TransformError::new(
                PLUGIN,
                &record.path,
                "only .css files can be purged",
            ));
        }

        // `index.min.css` and `index.css` both pair with `index.html`.
        let base = record
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .split('.')
            .next()
            .unwrap_or("")
            .to_string();
        let target = format!("{base}.html");

        let page = util::find_file_in_dir(&self.html_dir, &target, true).ok_or_else(|| {
            TransformError::new(PLUGIN, &record.path, format!("HTML file {target} not found"))
        })?;
        let html = std::fs::read_to_string(&page)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let stylesheet = std::str::from_utf8(bytes)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        let used = css::html_tokens(&html);
        let purged = css::purge(stylesheet, &used)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        if purged.trim().is_empty() && !stylesheet.trim().is_empty() {
            // Nothing survived: the stylesheet and page disagree entirely,
            // which is a wiring mistake, not a valid result.
            return Err(TransformError::new(
                PLUGIN,
                &record.path,
                format!("every rule was purged against {target}"),
            ));
        }
        record.contents = Contents::Buffer(purged.into_bytes());
        Ok(StageOutput::One(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn html_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("ru");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join("index.html"),
            r#"<body class="page"><button class="btn">Go</button></body>"#,
        )
        .unwrap();
        tmp
    }

    fn run(purger: &mut CssUnusedRulePurger, path: &str, css: &str) -> String {
        let out = purger
            .apply(FileRecord::from_bytes(path, css.as_bytes().to_vec()))
            .unwrap();
        let StageOutput::One(rec) = out else {
            panic!("expected one record");
        };
        String::from_utf8(rec.bytes().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn purges_against_nested_page() {
        let tree = html_tree();
        let mut purger = CssUnusedRulePurger::new(tree.path());
        let out = run(&mut purger, "index.css", ".btn { a: b; }\n.ghost { a: b; }");
        assert!(out.contains(".btn"));
        assert!(!out.contains(".ghost"));
    }

    #[test]
    fn dotted_stem_pairs_by_first_segment() {
        let tree = html_tree();
        let mut purger = CssUnusedRulePurger::new(tree.path());
        let out = run(&mut purger, "index.min.css", ".page { a: b; }");
        assert!(out.contains(".page"));
    }

    #[test]
    fn missing_page_is_a_named_error() {
        let tree = html_tree();
        let mut purger = CssUnusedRulePurger::new(tree.path());
        let err = purger
            .apply(FileRecord::from_bytes("about.css", b".x{}".to_vec()))
            .unwrap_err();
        assert!(err.to_string().contains("HTML file about.html not found"));
    }

    #[test]
    fn fully_purged_stylesheet_is_an_error() {
        let tree = html_tree();
        let mut purger = CssUnusedRulePurger::new(tree.path());
        let err = purger
            .apply(FileRecord::from_bytes(
                "index.css",
                b".ghost { a: b; }".to_vec(),
            ))
            .unwrap_err();
        assert!(err.to_string().contains("every rule was purged"));
    }

    #[test]
    fn non_css_record_is_an_error() {
        let tree = html_tree();
        let mut purger = CssUnusedRulePurger::new(tree.path());
        let err = purger
            .apply(FileRecord::from_bytes("index.html", b"<p>".to_vec()))
            .unwrap_err();
        assert_eq!(err.plugin, "cssPurge");
    }
}
