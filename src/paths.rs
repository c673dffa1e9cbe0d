//! Project path resolution.
//!
//! All source and destination locations derive from three roots handed in
//! on the command line (`--source`, `--output`, `--temp`), resolved against
//! the project root once at startup. Pure data — no I/O happens here.
//!
//! ## Source layout
//!
//! ```text
//! src/
//! ├── html/                     # Pages (templates/ holds @@include partials)
//! │   └── templates/
//! ├── scss/                     # Root stylesheets only participate
//! ├── js/                       # Bundle entry points
//! └── assets/
//!     ├── img/                  # Raster + vector images
//!     │   └── svgIcons/{mono,multi}/   # Sprite sources (excluded from img pipe)
//!     ├── fonts/
//!     ├── data/
//!     │   └── pagesVersions/    # <lang>.json page metadata
//!     └── utils/                # robots.txt, .htaccess, favicons...
//! ```
//!
//! ## Destination layout
//!
//! ```text
//! dist/
//! ├── html/<lang>/*.html
//! ├── css/*.css + *.min.css
//! ├── js/*.bundle.js
//! └── assets/{img,fonts,data}/ (+ img/svgIcons/sprite.{mono,multi}.svg)
//! ```

use std::path::{Path, PathBuf};

/// Image extensions handled by the image pipe.
pub const IMG_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "svg", "gif", "webp", "avif", "ico"];

/// Font extensions copied by the fonts pipe.
pub const FONT_EXTENSIONS: &[&str] = &["eot", "woff", "woff2", "ttf", "otf"];

/// Data extensions copied by the data pipe.
pub const DATA_EXTENSIONS: &[&str] = &["json", "pdf", "xml"];

/// Resolved absolute locations for one build invocation.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub temp: PathBuf,
}

impl ProjectPaths {
    /// Resolve `source`/`output`/`temp` against `root` (absolute inputs
    /// are kept as-is).
    pub fn new(root: &Path, source: &Path, output: &Path, temp: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        Self {
            root: root.to_path_buf(),
            src: join(source),
            dist: join(output),
            temp: join(temp),
        }
    }

    /// Directory name of the project root, used to name archives.
    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("site")
            .to_string()
    }

    // ---- source tree ----

    pub fn html_src(&self) -> PathBuf {
        self.src.join("html")
    }

    /// Partials included via `@@include(...)`; excluded from page globbing.
    pub fn templates_dir(&self) -> PathBuf {
        self.html_src().join("templates")
    }

    pub fn scss_src(&self) -> PathBuf {
        self.src.join("scss")
    }

    pub fn js_src(&self) -> PathBuf {
        self.src.join("js")
    }

    pub fn img_src(&self) -> PathBuf {
        self.src.join("assets/img")
    }

    /// Sprite icon sources live under the image tree but are excluded from
    /// the image pipe.
    pub fn svg_icons_src(&self) -> PathBuf {
        self.img_src().join("svgIcons")
    }

    pub fn svg_mono_src(&self) -> PathBuf {
        self.svg_icons_src().join("mono")
    }

    pub fn svg_multi_src(&self) -> PathBuf {
        self.svg_icons_src().join("multi")
    }

    pub fn fonts_src(&self) -> PathBuf {
        self.src.join("assets/fonts")
    }

    pub fn data_src(&self) -> PathBuf {
        self.src.join("assets/data")
    }

    pub fn pages_versions_dir(&self) -> PathBuf {
        self.data_src().join("pagesVersions")
    }

    pub fn utils_src(&self) -> PathBuf {
        self.src.join("assets/utils")
    }

    pub fn site_config_file(&self) -> PathBuf {
        self.root.join("site.toml")
    }

    // ---- destination tree ----

    pub fn dist_html(&self, lang: &str) -> PathBuf {
        self.dist.join("html").join(lang)
    }

    pub fn dist_css(&self) -> PathBuf {
        self.dist.join("css")
    }

    pub fn dist_js(&self) -> PathBuf {
        self.dist.join("js")
    }

    pub fn dist_img(&self) -> PathBuf {
        self.dist.join("assets/img")
    }

    pub fn dist_svg_icons(&self) -> PathBuf {
        self.dist_img().join("svgIcons")
    }

    pub fn dist_fonts(&self) -> PathBuf {
        self.dist.join("assets/fonts")
    }

    pub fn dist_data(&self) -> PathBuf {
        self.dist.join("assets/data")
    }

    // ---- temp tree (dev-mode change gating) ----

    pub fn temp_html(&self, lang: &str) -> PathBuf {
        self.temp.join("html").join(lang)
    }

    pub fn temp_css(&self) -> PathBuf {
        self.temp.join("css")
    }

    // ---- archives / cleanup ----

    pub fn zip_dist_target(&self) -> PathBuf {
        self.root.join(format!("{}.zip", self.root_name()))
    }

    pub fn zip_project_target(&self) -> PathBuf {
        self.root.join(format!("{}.project.zip", self.root_name()))
    }

    /// Everything removed by the clean task before a run.
    pub fn clean_targets(&self) -> Vec<PathBuf> {
        vec![
            self.dist.clone(),
            self.temp.clone(),
            self.zip_dist_target(),
            self.zip_project_target(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ProjectPaths {
        ProjectPaths::new(
            Path::new("/proj"),
            Path::new("src"),
            Path::new("dist"),
            Path::new(".sitemill-temp"),
        )
    }

    #[test]
    fn relative_roots_resolve_against_project_root() {
        let p = paths();
        assert_eq!(p.src, PathBuf::from("/proj/src"));
        assert_eq!(p.dist, PathBuf::from("/proj/dist"));
        assert_eq!(p.temp, PathBuf::from("/proj/.sitemill-temp"));
    }

    #[test]
    fn absolute_roots_kept_as_is() {
        let p = ProjectPaths::new(
            Path::new("/proj"),
            Path::new("/elsewhere/src"),
            Path::new("dist"),
            Path::new("tmp"),
        );
        assert_eq!(p.src, PathBuf::from("/elsewhere/src"));
    }

    #[test]
    fn dist_html_is_per_language() {
        assert_eq!(paths().dist_html("ru"), PathBuf::from("/proj/dist/html/ru"));
    }

    #[test]
    fn archive_names_derive_from_root_dir() {
        let p = paths();
        assert_eq!(p.zip_dist_target(), PathBuf::from("/proj/proj.zip"));
        assert_eq!(
            p.zip_project_target(),
            PathBuf::from("/proj/proj.project.zip")
        );
    }

    #[test]
    fn clean_targets_cover_dist_temp_and_archives() {
        let targets = paths().clean_targets();
        assert_eq!(targets.len(), 4);
        assert!(targets.contains(&PathBuf::from("/proj/dist")));
        assert!(targets.contains(&PathBuf::from("/proj/.sitemill-temp")));
    }
}
