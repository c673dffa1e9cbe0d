//! # Sitemill
//!
//! An asset pipeline for multilingual static marketing sites. One source
//! tree of pages, SCSS, scripts and images becomes a deployable `dist/`
//! tree: per-language HTML with `<picture>` markup, plain and minified
//! CSS, WebP conversions of every raster image, and SVG sprite sheets.
//!
//! # Architecture: Record Pipelines
//!
//! Every task is a chain of [`pipeline::Stage`]s fed with
//! [`record::FileRecord`]s — in-memory files with a tree-relative path.
//! Stages are pure record transforms; the only stage with side effects is
//! the destination writer. A chain can write the same record twice at
//! different points (the stylesheet pipe persists both `index.css` and
//! `index.min.css` from one pass).
//!
//! Task order matters once: images run before HTML, because the picture
//! rewriter only emits a `<source>` for files that already exist under
//! `dist/`. Everything after that point is independent and runs in
//! parallel.
//!
//! ```text
//! clean → images → html → { styles | js | fonts | sprites | data | utils }
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`record`] | The pipeline's unit of data and shared transform pre-flight |
//! | [`pipeline`] | Stage trait, chain runner, destination writer, error policy |
//! | [`transforms`] | The stage library: convert, optimize, picture, sprite, purge, rename |
//! | [`tasks`] | Orchestration — one function per pipe, plus `run`, `check`, `gen-config` |
//! | [`config`] | `site.toml` loading and per-page head data from `pagesVersions/` |
//! | [`html`] | `@@include` expansion, placeholder substitution, output tidying |
//! | [`css`] | Rule-level CSS parsing, purging, optimization and minification |
//! | [`svg`] | Tag-level SVG cleanup for sprites and standalone assets |
//! | [`changegate`] | mtime-based LRU gate that lets dev rebuilds skip untouched images |
//! | [`paths`] | Source/destination layout, resolved once per invocation |
//! | [`util`] | Filesystem walking and cleanup helpers |
//!
//! # Design Decisions
//!
//! ## Dev and Build Are One Pipeline
//!
//! There is no separate "watch" implementation: dev mode is the same run
//! with cheap encode profiles, readable output and change gating (the
//! mtime gate for images, content hashing against a temp tree for HTML
//! and CSS). Build mode swaps in the tuned encode profiles, minifies,
//! optionally purges unused CSS, and can emit deployment archives.
//!
//! ## Pure-Rust Codecs
//!
//! Image re-encoding goes through the `image` crate's native codecs, so
//! the binary carries no system dependencies. One consequence is explicit
//! in [`transforms::convert`]: WebP output is always lossless, because
//! that is the only encode mode the pure-Rust encoder offers.
//!
//! ## Existence-Gated Markup
//!
//! The picture rewriter never takes the image pipe's word for anything:
//! it checks the destination tree for each candidate file before writing
//! a `<source>`. Markup can therefore never reference a variant that
//! failed to encode.

pub mod changegate;
pub mod config;
pub mod css;
pub mod html;
pub mod paths;
pub mod pipeline;
pub mod record;
pub mod svg;
pub mod tasks;
pub mod transforms;
pub mod util;
