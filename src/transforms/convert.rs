//! Raster format conversion with per-format encode profiles.
//!
//! The convertibility table is fixed: modern formats are produced from the
//! classic ones and vice versa, and SVG never converts. Encoding goes
//! through the `image` crate's native codecs. WebP output is always
//! lossless (the encoder offers no lossy mode), so its quality knob only
//! participates in profile selection, not in the emitted bytes.

use crate::record::{normalize, FileRecord, Normalized, TransformError};
use crate::pipeline::{Stage, StageOutput};
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, ImageReader};
use std::io::Cursor;

const PLUGIN: &str = "imgConverter";

/// Image formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImgFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Avif,
    Svg,
}

impl ImgFormat {
    /// Parse from a lowercased extension (`jpg` and `jpeg` both map to
    /// [`ImgFormat::Jpeg`]).
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Canonical output extension.
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Svg => "svg",
        }
    }
}

/// Whether `from` may be converted to `to`.
pub fn can_convert(from: ImgFormat, to: ImgFormat) -> bool {
    use ImgFormat::*;
    matches!(
        (from, to),
        (Jpeg, Webp)
            | (Jpeg, Avif)
            | (Png, Webp)
            | (Png, Avif)
            | (Gif, Webp)
            | (Avif, Jpeg)
            | (Avif, Png)
            | (Webp, Jpeg)
            | (Webp, Png)
            | (Webp, Gif)
    )
}

/// Encode parameters for one output format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatProfile {
    /// 1..=100; codec-specific meaning.
    pub quality: u8,
    /// Encoder effort, 0 (fastest) to 10 (slowest); AVIF maps this onto
    /// its speed scale.
    pub effort: u8,
    /// PNG compression level 0..=9 (used for PNG only).
    pub png_level: u8,
    pub progressive: bool,
    pub lossless: bool,
}

/// Tuned-for-size profile per format, the `build` default.
pub fn optimized_profile(format: ImgFormat) -> FormatProfile {
    match format {
        ImgFormat::Jpeg => FormatProfile {
            quality: 75,
            effort: 6,
            png_level: 0,
            progressive: true,
            lossless: false,
        },
        ImgFormat::Png => FormatProfile {
            quality: 80,
            effort: 6,
            png_level: 5,
            progressive: false,
            lossless: true,
        },
        ImgFormat::Webp => FormatProfile {
            quality: 75,
            effort: 4,
            png_level: 0,
            progressive: false,
            lossless: true,
        },
        ImgFormat::Avif => FormatProfile {
            quality: 75,
            effort: 4,
            png_level: 0,
            progressive: false,
            lossless: false,
        },
        ImgFormat::Gif | ImgFormat::Svg => FormatProfile {
            quality: 75,
            effort: 4,
            png_level: 0,
            progressive: false,
            lossless: false,
        },
    }
}

/// Fastest-possible profile, the `dev` default: full quality, zero effort.
pub fn minimal_profile(format: ImgFormat) -> FormatProfile {
    FormatProfile {
        quality: 100,
        effort: 0,
        png_level: 0,
        progressive: false,
        lossless: matches!(format, ImgFormat::Png | ImgFormat::Webp),
    }
}

/// Caller-supplied tweaks, merged over the optimized profile only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileOverrides {
    pub quality: Option<u8>,
    pub effort: Option<u8>,
    pub png_level: Option<u8>,
}

/// Resolve the effective profile for one output format.
///
/// Overrides apply only when optimizing; the minimal profile is fixed so
/// dev rebuilds stay deterministic and fast no matter what the site config
/// asks for.
pub fn select_profile(
    format: ImgFormat,
    to_optimize: bool,
    overrides: &ProfileOverrides,
) -> FormatProfile {
    if !to_optimize {
        return minimal_profile(format);
    }
    let mut profile = optimized_profile(format);
    if let Some(q) = overrides.quality {
        profile.quality = q.clamp(1, 100);
    }
    if let Some(e) = overrides.effort {
        profile.effort = e.min(10);
    }
    if let Some(l) = overrides.png_level {
        profile.png_level = l.min(9);
    }
    profile
}

/// Proportional downscale bound.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Resize {
    /// Target dimensions for an image of `(w, h)`, preserving aspect ratio
    /// and never upscaling. `None` means the image already fits.
    fn target(&self, w: u32, h: u32) -> Option<(u32, u32)> {
        let scale_w = self.width.filter(|&max| max < w).map(|max| max as f64 / w as f64);
        let scale_h = self.height.filter(|&max| max < h).map(|max| max as f64 / h as f64);
        let scale = match (scale_w, scale_h) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        let nw = ((w as f64 * scale).round() as u32).max(1);
        let nh = ((h as f64 * scale).round() as u32).max(1);
        Some((nw, nh))
    }
}

fn avif_speed(effort: u8) -> u8 {
    // AVIF speed runs 1 (slow) to 10 (fast), inverse of effort.
    (10 - effort.min(9)).max(1)
}

/// Encode a decoded image into `format` bytes per `profile`.
pub fn encode_raster(
    img: &DynamicImage,
    format: ImgFormat,
    profile: &FormatProfile,
) -> image::ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImgFormat::Jpeg => {
            let enc = JpegEncoder::new_with_quality(&mut out, profile.quality);
            // JPEG has no alpha channel.
            img.to_rgb8().write_with_encoder(enc)?;
        }
        ImgFormat::Png => {
            let compression = if profile.png_level >= 7 {
                CompressionType::Best
            } else if profile.png_level == 0 {
                CompressionType::Fast
            } else {
                CompressionType::Default
            };
            let enc = PngEncoder::new_with_quality(&mut out, compression, PngFilterType::Adaptive);
            img.write_with_encoder(enc)?;
        }
        ImgFormat::Webp => {
            let enc = WebPEncoder::new_lossless(&mut out);
            img.write_with_encoder(enc)?;
        }
        ImgFormat::Avif => {
            let enc = AvifEncoder::new_with_speed_quality(
                &mut out,
                avif_speed(profile.effort),
                profile.quality,
            );
            img.write_with_encoder(enc)?;
        }
        ImgFormat::Gif => {
            let mut enc = GifEncoder::new_with_speed(&mut out, 10);
            enc.encode_frame(Frame::new(img.to_rgba8()))?;
        }
        ImgFormat::Svg => unreachable!("SVG is not a raster target"),
    }
    Ok(out.into_inner())
}

/// Converts matching raster records to one output format.
pub struct ImageConverter {
    inputs: Vec<ImgFormat>,
    output: ImgFormat,
    resize: Option<Resize>,
    to_optimize: bool,
    /// Drop non-matching records instead of passing them through.
    skip_others: bool,
    overrides: ProfileOverrides,
    /// Input validation happens lazily so that constructing a misconfigured
    /// chain is not itself an error; it stays false until validation passes,
    /// so a misconfiguration errors on every record.
    checked: bool,
}

impl ImageConverter {
    pub fn new(inputs: Vec<ImgFormat>, output: ImgFormat) -> Self {
        Self {
            inputs,
            output,
            resize: None,
            to_optimize: false,
            skip_others: false,
            overrides: ProfileOverrides::default(),
            checked: false,
        }
    }

    pub fn resize(mut self, resize: Resize) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn optimize(mut self, on: bool) -> Self {
        self.to_optimize = on;
        self
    }

    pub fn skip_others(mut self, on: bool) -> Self {
        self.skip_others = on;
        self
    }

    pub fn overrides(mut self, overrides: ProfileOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    fn check_config(&mut self, record: &FileRecord) -> Result<(), TransformError> {
        if self.checked {
            return Ok(());
        }
        if self.inputs.is_empty() {
            return Err(TransformError::new(
                PLUGIN,
                &record.path,
                "no input formats configured",
            ));
        }
        if !self.inputs.iter().any(|&f| can_convert(f, self.output)) {
            return Err(TransformError::new(
                PLUGIN,
                &record.path,
                format!(
                    "no configured input format is convertible to {}",
                    self.output.ext()
                ),
            ));
        }
        self.checked = true;
        Ok(())
    }

    fn convert(&self, record: &FileRecord) -> Result<FileRecord, TransformError> {
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new(PLUGIN, &record.path, "record has no buffer"))?;
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;
        let mut img = reader
            .decode()
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        if let Some(resize) = &self.resize
            && let Some((w, h)) = resize.target(img.width(), img.height())
        {
            img = img.resize_exact(w, h, FilterType::Lanczos3);
        }

        let profile = select_profile(self.output, self.to_optimize, &self.overrides);
        let out = encode_raster(&img, self.output, &profile)
            .map_err(|e| TransformError::new(PLUGIN, &record.path, e))?;

        let mut converted = FileRecord::from_bytes(record.path.clone(), out);
        converted.set_extension(self.output.ext());
        Ok(converted)
    }
}

impl Stage for ImageConverter {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize(PLUGIN, &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }
        self.check_config(&record)?;

        let format = record.extension().as_deref().and_then(ImgFormat::from_ext);
        let convertible = format
            .map(|f| self.inputs.contains(&f) && can_convert(f, self.output))
            .unwrap_or(false);

        if !convertible {
            return if self.skip_others {
                Ok(StageOutput::Consumed)
            } else {
                Ok(StageOutput::One(record))
            };
        }

        let converted = self.convert(&record)?;
        Ok(StageOutput::One(converted))
    }
}
