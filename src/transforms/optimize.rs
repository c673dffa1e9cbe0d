//! In-place image optimization: re-encode rasters with the tuned profile,
//! clean SVG noise. The record keeps its format and path; only the body
//! changes. Unrecognized extensions pass through with a console note so a
//! stray file in the image tree is visible but harmless.

use crate::pipeline::{Stage, StageOutput};
use crate::record::{normalize, FileRecord, Normalized, TransformError};
use crate::svg;
use crate::transforms::convert::{
    encode_raster, select_profile, ImgFormat, ProfileOverrides,
};
use image::ImageReader;
use std::collections::HashMap;
use std::io::Cursor;

const PLUGIN: &str = "imgOptimizer";

/// Re-encodes each record with its format's optimized profile.
pub struct ImageOptimizer {
    /// Per-format profile tweaks from the site config.
    overrides: HashMap<ImgFormat, ProfileOverrides>,
}

impl ImageOptimizer {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(overrides: HashMap<ImgFormat, ProfileOverrides>) -> Self {
        Self { overrides }
    }

    fn optimize_raster(
        &self,
        record: &FileRecord,
        format: ImgFormat,
    ) -> Result<Vec<u8>, TransformError> {
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?
            .decode()
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        let overrides = self.overrides.get(&format).copied().unwrap_or_default();
        let profile = select_profile(format, true, &overrides);
        encode_raster(&img, format, &profile)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))
    }

    fn optimize_svg(&self, record: &FileRecord) -> Result<Vec<u8>, TransformError> {
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        let out = svg::optimize_standalone(text)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        Ok(out.into_bytes())
    }
}

impl Default for ImageOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for ImageOptimizer {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, mut record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize(PLUGIN, &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }

        let Some(format) = record.extension().as_deref().and_then(ImgFormat::from_ext) else {
            println!("image left unoptimized... {}", record.file_name());
            return Ok(StageOutput::One(record));
        };

        let body = match format {
            ImgFormat::Svg => self.optimize_svg(&record)?,
            raster => self.optimize_raster(&record, raster)?,
        };
        record.contents = crate::record::Contents::Buffer(body);
        Ok(StageOutput::One(record))
    }
}
