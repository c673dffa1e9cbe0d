//! SVG sprite assembly.
//!
//! Buffers every `.svg` record, optimizes each per the sprite preset, and
//! emits a single hidden sprite sheet on flush: `<symbol>` elements keyed
//! by source basename, referenced from markup as
//! `<use href="sprite.mono.svg#name">`.
//!
//! A malformed icon fails that file only; the sheet still flushes with the
//! icons that parsed.

use crate::pipeline::{Stage, StageOutput};
use crate::record::{normalize, FileRecord, Normalized, TransformError};
use crate::svg::{self, SpritePreset};

const PLUGIN: &str = "svgSprite";

struct Symbol {
    id: String,
    attrs: Vec<(String, String)>,
    inner: String,
}

/// Collects optimized icons into one sprite sheet record.
pub struct SvgSpriteBuilder {
    preset: SpritePreset,
    sprite_file_name: String,
    symbols: Vec<Symbol>,
}

impl SvgSpriteBuilder {
    pub fn new(preset: SpritePreset) -> Self {
        Self {
            preset,
            sprite_file_name: format!("sprite.{}.svg", preset.name()),
            symbols: Vec::new(),
        }
    }

    fn push_icon(&mut self, record: &FileRecord) -> Result<(), TransformError> {
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        let optimized = svg::optimize_icon(text, self.preset)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        let root = svg::parse_root(&optimized)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        let id = record
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("icon")
            .to_string();

        // Symbols carry viewBox (and any remaining root attrs except xmlns,
        // which lives on the sheet).
        let attrs = root
            .attrs
            .into_iter()
            .filter(|(name, _)| !name.starts_with("xmlns"))
            .collect();

        self.symbols.push(Symbol {
            id,
            attrs,
            inner: root.inner,
        });
        Ok(())
    }

    fn render_sheet(&self) -> String {
        let mut out =
            String::from(r#"<svg xmlns="http://www.w3.org/2000/svg" style="display: none;">"#);
        for sym in &self.symbols {
            out.push_str("<symbol id=\"");
            out.push_str(&sym.id);
            out.push('"');
            for (name, value) in &sym.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            out.push('>');
            out.push_str(&sym.inner);
            out.push_str("</symbol>");
        }
        out.push_str("</svg>");
        out
    }
}

impl Stage for SvgSpriteBuilder {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize(PLUGIN, &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }
        if record.extension().as_deref() != Some("svg") {
            return Ok(StageOutput::One(record));
        }
        self.push_icon(&record)?;
        Ok(StageOutput::Consumed)
    }

    fn flush(&mut self) -> Result<Vec<FileRecord>, TransformError> {
        if self.symbols.is_empty() {
            return Ok(Vec::new());
        }
        let sheet = self.render_sheet();
        Ok(vec![FileRecord::from_bytes(
            self.sprite_file_name.clone(),
            sheet.into_bytes(),
        )])
    }
}
