//! Build orchestration.
//!
//! A run is: clean, then images, then HTML (the picture rewriter needs the
//! converted images on disk), then the remaining pipes in parallel. Build
//! mode optionally finishes with the dist and project archives.
//!
//! Failure policy is uniform: a pipe logs per-file errors and keeps going,
//! then reports failure; `run` waits for every pipe and exits non-zero if
//! any failed. Partial output is left in place for inspection.

use crate::changegate::ChangeGate;
use crate::config::{self, ConfigError, SiteConfig};
use crate::css;
use crate::html::{self, HtmlError};
use crate::paths::{ProjectPaths, DATA_EXTENSIONS, FONT_EXTENSIONS, IMG_EXTENSIONS};
use crate::pipeline::{read_records, run_chain, Dest, PipelineError, Stage, StageOutput};
use crate::record::{normalize, Contents, FileRecord, Normalized, TransformError};
use crate::svg::SpritePreset;
use crate::transforms::{
    CssUnusedRulePurger, FileRenamer, ImageConverter, ImageOptimizer, ImgFormat,
    PictureTagRewriter, Resize, SvgSpriteBuilder,
};
use crate::util;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Html(#[from] HtmlError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("SCSS compile error: {0}")]
    Scss(String),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{failed} file(s) failed in task '{task}'")]
    RecordsFailed { task: &'static str, failed: usize },
    #[error("{0} parallel task(s) failed")]
    ParallelFailed(usize),
    #[error("preflight check failed:\n{0}")]
    Preflight(String),
}

/// Dev keeps output readable and skips expensive encoding; build produces
/// the deployable tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Build,
}

/// Shared state for one run.
pub struct BuildContext {
    pub mode: Mode,
    pub paths: ProjectPaths,
    pub config: SiteConfig,
    pub languages: Vec<String>,
    gate: Mutex<ChangeGate>,
}

impl BuildContext {
    pub fn new(mode: Mode, paths: ProjectPaths) -> Result<Self, TaskError> {
        let config = config::load_site_config(&paths.site_config_file())?;
        let languages = if config.languages.is_empty() {
            util::files_entries(&paths.pages_versions_dir(), "json")
                .into_keys()
                .collect()
        } else {
            config.languages.clone()
        };
        Ok(Self {
            mode,
            paths,
            config,
            languages,
            gate: Mutex::new(ChangeGate::new()),
        })
    }

    fn optimizing(&self) -> bool {
        self.mode == Mode::Build
    }
}

/// Full pipeline: clean, images, html, then the independent pipes.
pub fn run(mode: Mode, paths: ProjectPaths) -> Result<(), TaskError> {
    let ctx = BuildContext::new(mode, paths)?;

    clean(&ctx.paths)?;
    pipe_images(&ctx)?;
    pipe_html(&ctx)?;

    let failures = Mutex::new(0usize);
    let note = |name: &str, result: Result<(), TaskError>| {
        if let Err(err) = result {
            eprintln!("Error at {name}... {err}");
            if let Ok(mut n) = failures.lock() {
                *n += 1;
            }
        }
    };
    rayon::scope(|s| {
        s.spawn(|_| note("styles", pipe_styles(&ctx)));
        s.spawn(|_| note("js", pipe_js(&ctx)));
        s.spawn(|_| note("fonts", pipe_fonts(&ctx)));
        s.spawn(|_| note("spriteMono", pipe_sprite(&ctx, SpritePreset::Mono)));
        s.spawn(|_| note("spriteMulti", pipe_sprite(&ctx, SpritePreset::Multi)));
        s.spawn(|_| note("data", pipe_data(&ctx)));
        s.spawn(|_| note("utils", pipe_utils(&ctx)));
    });

    // A poisoned counter means a pipe panicked; count it as one failure.
    let failed = failures.into_inner().unwrap_or(1);
    if failed > 0 {
        return Err(TaskError::ParallelFailed(failed));
    }

    if ctx.mode == Mode::Build && ctx.config.archive {
        zip_dist(&ctx)?;
        zip_project(&ctx)?;
    }
    Ok(())
}

/// Remove dist, temp and stale archives.
pub fn clean(paths: &ProjectPaths) -> Result<(), TaskError> {
    util::clean_paths(&paths.clean_targets())?;
    Ok(())
}

// ==== images ====

fn pipe_images(ctx: &BuildContext) -> Result<(), TaskError> {
    let img_src = ctx.paths.img_src();
    let icons = ctx.paths.svg_icons_src();
    let mut files = util::collect_files(&img_src, |p| {
        util::has_extension(p, IMG_EXTENSIONS) && !p.starts_with(&icons)
    });

    // Dev rebuilds skip files whose mtime the gate already saw.
    if ctx.mode == Mode::Dev
        && let Ok(mut gate) = ctx.gate.lock()
    {
        files.retain(|p| gate.is_changed(p).unwrap_or(true));
    }

    let records = read_records(&img_src, &files)?;

    // Encoding dominates the build; each file runs its own chain on the
    // rayon pool. Completion order is not input order.
    let failed: usize = records
        .into_par_iter()
        .map(|record| {
            let mut stages = image_stages(ctx);
            match run_chain("images", vec![record], &mut stages) {
                Ok(()) => 0,
                Err(PipelineError::RecordsFailed { failed, .. }) => failed,
                Err(_) => 1,
            }
        })
        .sum();

    if failed > 0 {
        return Err(TaskError::RecordsFailed {
            task: "images",
            failed,
        });
    }
    Ok(())
}

/// Writes the (optionally re-encoded) original, then the WebP conversion.
fn image_stages(ctx: &BuildContext) -> Vec<Box<dyn Stage>> {
    let mut converter = ImageConverter::new(vec![ImgFormat::Jpeg, ImgFormat::Png], ImgFormat::Webp)
        .optimize(ctx.optimizing())
        .skip_others(true);
    if let Some(width) = ctx.config.images.resize_width {
        converter = converter.resize(Resize {
            width: Some(width),
            height: None,
        });
    }

    let mut stages: Vec<Box<dyn Stage>> = Vec::new();
    if ctx.optimizing() {
        stages.push(Box::new(ImageOptimizer::with_overrides(
            ctx.config.image_overrides(),
        )));
    }
    stages.push(Box::new(Dest::new(ctx.paths.dist_img())));
    stages.push(Box::new(converter));
    stages.push(Box::new(Dest::new(ctx.paths.dist_img())));
    stages
}

// ==== html ====

/// Pages live anywhere under `src/html/` except `templates/`, keyed by
/// file stem; output is flat per language.
fn page_entries(paths: &ProjectPaths) -> std::collections::BTreeMap<String, PathBuf> {
    let templates = paths.templates_dir();
    let files = util::collect_files(&paths.html_src(), |p| {
        util::has_extension(p, &["html"]) && !p.starts_with(&templates)
    });
    files
        .into_iter()
        .filter_map(|p| {
            let stem = p.file_stem().and_then(|s| s.to_str())?.to_string();
            Some((stem, p))
        })
        .collect()
}

fn pipe_html(ctx: &BuildContext) -> Result<(), TaskError> {
    let pages = page_entries(&ctx.paths);
    let heads = config::load_page_heads(&ctx.paths.pages_versions_dir(), &ctx.languages)?;
    let templates = ctx.paths.templates_dir();

    let mut failed = 0usize;
    for lang in &ctx.languages {
        let mut rewriter = PictureTagRewriter::new(&ctx.paths.dist, &ctx.config.retina_size);
        let mut out_records = Vec::new();

        for (page, path) in &pages {
            match render_page(ctx, &templates, &heads, lang, page, path, &mut rewriter) {
                Ok(Some(record)) => out_records.push(record),
                Ok(None) => {} // unchanged in dev mode
                Err(err) => {
                    eprintln!("Error at html... {err}");
                    failed += 1;
                }
            }
        }

        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(Dest::new(ctx.paths.dist_html(lang)))];
        if let Err(PipelineError::RecordsFailed { failed: n, .. }) =
            run_chain("html", out_records, &mut stages)
        {
            failed += n;
        }
    }

    if failed > 0 {
        return Err(TaskError::RecordsFailed {
            task: "html",
            failed,
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_page(
    ctx: &BuildContext,
    templates: &Path,
    heads: &config::PageHeads,
    lang: &str,
    page: &str,
    path: &Path,
    rewriter: &mut PictureTagRewriter,
) -> Result<Option<FileRecord>, TaskError> {
    let source = fs::read_to_string(path)?;
    let expanded = html::expand_includes(&source, templates)?;

    let head = heads
        .get(lang)
        .and_then(|pages| pages.get(page))
        .cloned()
        .unwrap_or_else(|| {
            eprintln!("no head data for {page} in {lang}, using defaults");
            config::PageHead::default()
        });
    let values = config::page_placeholders(&ctx.config, &ctx.languages, lang, page, &head);
    let filled = html::apply_placeholders(&expanded, &values);
    let tidied = html::collapse_img_whitespace(&filled);

    let record = FileRecord::from_bytes(format!("{page}.html"), tidied.into_bytes());
    let record = match rewriter.apply(record)? {
        StageOutput::One(rec) => rec,
        _ => return Ok(None),
    };

    let body = record
        .bytes()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    let final_html = match ctx.mode {
        Mode::Dev => html::tidy_html(&body),
        Mode::Build => html::clean_html(&body),
    };

    // Dev gating: skip pages whose rendered content has not moved since
    // the previous run (compared against the temp tree).
    if ctx.mode == Mode::Dev {
        let temp_file = ctx.paths.temp_html(lang).join(format!("{page}.html"));
        if !content_changed(&temp_file, final_html.as_bytes())? {
            return Ok(None);
        }
    }

    Ok(Some(FileRecord::from_bytes(
        format!("{page}.html"),
        final_html.into_bytes(),
    )))
}

// ==== styles ====

/// Minify stage for stylesheet records.
struct CssMinify;

impl Stage for CssMinify {
    fn name(&self) -> &'static str {
        "cssMinify"
    }

    fn apply(&mut self, mut record: FileRecord) -> Result<StageOutput, TransformError> {
        if normalize("cssMinify", &record)? == Normalized::PassThrough {
            return Ok(StageOutput::One(record));
        }
        let bytes = record
            .bytes()
            .ok_or_else(|| TransformError::new("cssMinify", &record.path, "record has no buffer"))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TransformError::new("cssMinify", &record.path, e))?;
        record.contents = Contents::Buffer(css::minify(text).into_bytes());
        Ok(StageOutput::One(record))
    }
}

fn pipe_styles(ctx: &BuildContext) -> Result<(), TaskError> {
    let scss_dir = ctx.paths.scss_src();
    let entries = util::files_entries(&scss_dir, "scss");

    let mut records = Vec::new();
    for (name, path) in &entries {
        // Partials participate through @use/@import only.
        if name.starts_with('_') {
            continue;
        }
        let compiled = grass::from_path(path, &grass::Options::default())
            .map_err(|e| TaskError::Scss(e.to_string()))?;
        let optimized = css::optimize(&compiled);

        if ctx.mode == Mode::Dev {
            let temp_file = ctx.paths.temp_css().join(format!("{name}.css"));
            if !content_changed(&temp_file, optimized.as_bytes())? {
                continue;
            }
        }
        records.push(FileRecord::from_bytes(
            format!("{name}.css"),
            optimized.into_bytes(),
        ));
    }

    let mut stages: Vec<Box<dyn Stage>> = Vec::new();
    if ctx.mode == Mode::Build && ctx.config.purge_css {
        stages.push(Box::new(CssUnusedRulePurger::new(ctx.paths.html_src())));
    }
    stages.push(Box::new(Dest::new(ctx.paths.dist_css())));
    stages.push(Box::new(CssMinify));
    stages.push(Box::new(FileRenamer::with_suffix("min")));
    stages.push(Box::new(Dest::new(ctx.paths.dist_css())));

    run_chain("styles", records, &mut stages)?;
    Ok(())
}

// ==== the copy pipes ====

fn pipe_js(ctx: &BuildContext) -> Result<(), TaskError> {
    let js_dir = ctx.paths.js_src();
    let files = util::collect_files(&js_dir, |p| util::has_extension(p, &["js"]));
    let records = read_records(&js_dir, &files)?;

    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(FileRenamer::with_suffix("bundle")),
        Box::new(Dest::new(ctx.paths.dist_js())),
    ];
    run_chain("js", records, &mut stages)?;
    Ok(())
}

fn pipe_fonts(ctx: &BuildContext) -> Result<(), TaskError> {
    let fonts_dir = ctx.paths.fonts_src();
    let files = util::collect_files(&fonts_dir, |p| util::has_extension(p, FONT_EXTENSIONS));
    let records = read_records(&fonts_dir, &files)?;

    let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(Dest::new(ctx.paths.dist_fonts()))];
    run_chain("fonts", records, &mut stages)?;
    Ok(())
}

fn pipe_sprite(ctx: &BuildContext, preset: SpritePreset) -> Result<(), TaskError> {
    let src = match preset {
        SpritePreset::Mono => ctx.paths.svg_mono_src(),
        SpritePreset::Multi => ctx.paths.svg_multi_src(),
    };
    let files = util::collect_files(&src, |p| util::has_extension(p, &["svg"]));
    if files.is_empty() {
        return Ok(());
    }
    let records = read_records(&src, &files)?;

    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(SvgSpriteBuilder::new(preset)),
        Box::new(Dest::new(ctx.paths.dist_svg_icons())),
    ];
    run_chain("sprite", records, &mut stages)?;
    Ok(())
}

fn pipe_data(ctx: &BuildContext) -> Result<(), TaskError> {
    let data_dir = ctx.paths.data_src();
    let files = util::collect_files(&data_dir, |p| util::has_extension(p, DATA_EXTENSIONS));
    let records = read_records(&data_dir, &files)?;

    let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(Dest::new(ctx.paths.dist_data()))];
    run_chain("data", records, &mut stages)?;
    Ok(())
}

/// robots.txt, favicons, .htaccess and friends land at the dist root.
fn pipe_utils(ctx: &BuildContext) -> Result<(), TaskError> {
    let utils_dir = ctx.paths.utils_src();
    let files = util::collect_files(&utils_dir, |_| true);
    let records = read_records(&utils_dir, &files)?;

    let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(Dest::new(ctx.paths.dist.clone()))];
    run_chain("utils", records, &mut stages)?;
    Ok(())
}

// ==== archives ====

fn zip_tree(root: &Path, target: &Path, exclude: &[PathBuf]) -> Result<(), TaskError> {
    let file = fs::File::create(target)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file()
            || path == target
            || exclude.iter().any(|ex| path.starts_with(ex))
        {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        writer.start_file(rel.to_string_lossy().into_owned(), options)?;
        let mut src = fs::File::open(path)?;
        io::copy(&mut src, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

fn zip_dist(ctx: &BuildContext) -> Result<(), TaskError> {
    zip_tree(&ctx.paths.dist, &ctx.paths.zip_dist_target(), &[])
}

/// Project archive: sources and config, without build products.
fn zip_project(ctx: &BuildContext) -> Result<(), TaskError> {
    let exclude = vec![
        ctx.paths.dist.clone(),
        ctx.paths.temp.clone(),
        ctx.paths.root.join("target"),
        ctx.paths.root.join(".git"),
        ctx.paths.zip_dist_target(),
    ];
    zip_tree(&ctx.paths.root, &ctx.paths.zip_project_target(), &exclude)
}

// ==== preflight / scaffolding ====

/// Validate config and source layout before any work. Problems are
/// collected so one run reports everything wrong at once.
pub fn check(paths: &ProjectPaths) -> Result<(), TaskError> {
    let mut problems = Vec::new();

    match config::load_site_config(&paths.site_config_file()) {
        Ok(config) => {
            if config.languages.is_empty()
                && util::files_entries(&paths.pages_versions_dir(), "json").is_empty()
            {
                problems.push(format!(
                    "no languages configured and no files in {}",
                    paths.pages_versions_dir().display()
                ));
            }
        }
        Err(err) => problems.push(err.to_string()),
    }

    for (name, dir) in [
        ("html", paths.html_src()),
        ("scss", paths.scss_src()),
        ("images", paths.img_src()),
    ] {
        if !dir.is_dir() {
            problems.push(format!("missing {name} source directory: {}", dir.display()));
        }
    }
    if paths.html_src().is_dir() && page_entries(paths).is_empty() {
        problems.push(format!("no pages found in {}", paths.html_src().display()));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(TaskError::Preflight(problems.join("\n")))
    }
}

/// Sha256-compare `bytes` with the stored temp copy; updates the copy and
/// reports whether content moved. Missing temp file means changed.
fn content_changed(temp_file: &Path, bytes: &[u8]) -> io::Result<bool> {
    let new_hash = Sha256::digest(bytes);
    let changed = match fs::read(temp_file) {
        Ok(old) => Sha256::digest(&old) != new_hash,
        Err(_) => true,
    };
    if changed {
        if let Some(parent) = temp_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(temp_file, bytes)?;
    }
    Ok(changed)
}
