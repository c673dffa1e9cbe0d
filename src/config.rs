//! Site configuration and per-page head data.
//!
//! `site.toml` at the project root is optional; every field has a stock
//! default so a bare project builds. Unknown keys are rejected — a typo'd
//! option should fail loudly, not silently fall back.
//!
//! Per-page metadata lives in `assets/data/pagesVersions/<lang>.json`, one
//! file per language, mapping page name to its head block. The languages
//! the build produces come from the config when set, otherwise from the
//! JSON files that exist.

use crate::transforms::convert::{ImgFormat, ProfileOverrides};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Validation(String),
}

/// One script reference for a page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptLink {
    pub link: String,
    /// `defer`, `async` or empty for a plain tag.
    pub load_mode: String,
}

impl Default for ScriptLink {
    fn default() -> Self {
        Self {
            link: String::new(),
            load_mode: "defer".to_string(),
        }
    }
}

/// Image encode quality knobs from `site.toml`, merged over the optimized
/// profiles at build time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub jpeg_quality: u8,
    pub png_quality: u8,
    pub webp_quality: u8,
    pub avif_quality: u8,
    /// Downscale bound applied during conversion; unset means no resize.
    pub resize_width: Option<u32>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            png_quality: 80,
            webp_quality: 75,
            avif_quality: 60,
            resize_width: None,
        }
    }
}

/// Root configuration, `site.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute site origin used in canonical and alternate links.
    pub root_url: String,
    /// Default robots directive when a page's head omits one.
    pub robots: String,
    /// Retina density descriptor, e.g. `2x`.
    pub retina_size: String,
    /// Pages that get a `<link rel="canonical">`.
    pub meta_canonical: Vec<String>,
    /// Languages to build. Empty means: discover from pagesVersions files.
    pub languages: Vec<String>,
    /// Per-page stylesheet hrefs; pages not listed fall back to
    /// `css/<page>.min.css`.
    pub link_styles: BTreeMap<String, String>,
    /// Per-page script tags; pages not listed fall back to
    /// `js/<page>.bundle.js` deferred.
    pub link_scripts: BTreeMap<String, Vec<ScriptLink>>,
    pub images: ImagesConfig,
    /// Strip unused CSS rules in build mode.
    pub purge_css: bool,
    /// Produce dist and project zip archives in build mode.
    pub archive: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_url: "https://example.com".to_string(),
            robots: "noindex".to_string(),
            retina_size: "2x".to_string(),
            meta_canonical: Vec::new(),
            languages: Vec::new(),
            link_styles: BTreeMap::new(),
            link_scripts: BTreeMap::new(),
            images: ImagesConfig::default(),
            purge_css: false,
            archive: false,
        }
    }
}

impl SiteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_url.is_empty() {
            return Err(ConfigError::Validation("root_url must not be empty".into()));
        }
        for (name, q) in [
            ("jpeg_quality", self.images.jpeg_quality),
            ("png_quality", self.images.png_quality),
            ("webp_quality", self.images.webp_quality),
            ("avif_quality", self.images.avif_quality),
        ] {
            if !(1..=100).contains(&q) {
                return Err(ConfigError::Validation(format!(
                    "images.{name} must be in 1..=100, got {q}"
                )));
            }
        }
        if !self
            .retina_size
            .strip_suffix('x')
            .is_some_and(|n| n.parse::<u8>().is_ok())
        {
            return Err(ConfigError::Validation(format!(
                "retina_size must look like '2x', got '{}'",
                self.retina_size
            )));
        }
        Ok(())
    }

    /// Per-format profile overrides derived from the quality knobs.
    pub fn image_overrides(&self) -> HashMap<ImgFormat, ProfileOverrides> {
        let mut map = HashMap::new();
        for (format, quality) in [
            (ImgFormat::Jpeg, self.images.jpeg_quality),
            (ImgFormat::Png, self.images.png_quality),
            (ImgFormat::Webp, self.images.webp_quality),
            (ImgFormat::Avif, self.images.avif_quality),
        ] {
            map.insert(
                format,
                ProfileOverrides {
                    quality: Some(quality),
                    ..Default::default()
                },
            );
        }
        map
    }
}

/// Load `site.toml`; a missing file yields the stock defaults.
pub fn load_site_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    if !path.is_file() {
        return Ok(SiteConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: SiteConfig = toml::from_str(&text).map_err(|source| ConfigError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Stock `site.toml` content for `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# Site build configuration.

root_url = "https://example.com"
robots = "noindex"
retina_size = "2x"

# Pages that get a canonical link.
meta_canonical = []

# Languages to build; empty means every pagesVersions/<lang>.json found.
languages = []

purge_css = false
archive = false

[images]
jpeg_quality = 75
png_quality = 80
webp_quality = 75
avif_quality = 60
# resize_width = 1920

[link_styles]
# index = "css/index.min.css"

[link_scripts]
# index = [{ link = "js/index.bundle.js", load_mode = "defer" }]
"#
}

// ==== per-page head data ====

/// Head block for one page in one language.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageHead {
    pub description: String,
    pub title: String,
    /// Overrides the config-level robots directive when set.
    pub robots: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    head: PageHead,
}

/// `{ language → { page → head } }` loaded from the pagesVersions tree.
pub type PageHeads = BTreeMap<String, BTreeMap<String, PageHead>>;

/// Load head data for the given languages. Each language reads
/// `<dir>/<lang>.json`; a missing file is an error because the language
/// was explicitly requested (or discovered from this very directory).
pub fn load_page_heads(dir: &Path, languages: &[String]) -> Result<PageHeads, ConfigError> {
    let mut heads = PageHeads::new();
    for lang in languages {
        let path = dir.join(format!("{lang}.json"));
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let entries: BTreeMap<String, PageEntry> =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
        heads.insert(
            lang.clone(),
            entries.into_iter().map(|(k, v)| (k, v.head)).collect(),
        );
    }
    Ok(heads)
}

/// Placeholder values for one page render.
///
/// Raw-text values (`description`, `title`, `robots`, `lang`, `page`) slot
/// into attribute positions in the template; `canonical`, `alternate`,
/// `linkStyles` and `linkScripts` are complete tags.
pub fn page_placeholders(
    config: &SiteConfig,
    languages: &[String],
    lang: &str,
    page: &str,
    head: &PageHead,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert("description".to_string(), head.description.clone());
    values.insert("title".to_string(), head.title.clone());
    values.insert(
        "robots".to_string(),
        head.robots.clone().unwrap_or_else(|| config.robots.clone()),
    );
    values.insert("lang".to_string(), lang.to_string());
    values.insert("page".to_string(), page.to_string());

    let canonical = if config.meta_canonical.iter().any(|p| p == page) {
        format!(
            r#"<link rel="canonical" href="{}/html/{lang}/{page}.html">"#,
            config.root_url
        )
    } else {
        String::new()
    };
    values.insert("canonical".to_string(), canonical);

    let alternate = languages
        .iter()
        .filter(|l| l.as_str() != lang)
        .map(|l| {
            format!(
                r#"<link rel="alternate" hreflang="{l}" href="{}/html/{l}/{page}.html">"#,
                config.root_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    values.insert("alternate".to_string(), alternate);

    let style_href = config
        .link_styles
        .get(page)
        .cloned()
        .unwrap_or_else(|| format!("css/{page}.min.css"));
    values.insert(
        "linkStyles".to_string(),
        format!(r#"<link rel="stylesheet" href="../../{style_href}">"#),
    );

    let scripts = match config.link_scripts.get(page) {
        Some(links) => links.clone(),
        None => vec![ScriptLink {
            link: format!("js/{page}.bundle.js"),
            load_mode: "defer".to_string(),
        }],
    };
    let script_tags = scripts
        .iter()
        .map(|s| {
            let mode = if s.load_mode.is_empty() {
                String::new()
            } else {
                format!(" {}", s.load_mode)
            };
            format!(r#"<script src="../../{}"{mode}></script>"#, s.link)
        })
        .collect::<Vec<_>>()
        .join("\n");
    values.insert("linkScripts".to_string(), script_tags);

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_site_config(&tmp.path().join("site.toml")).unwrap();
        assert_eq!(config.root_url, "https://example.com");
        assert_eq!(config.retina_size, "2x");
        assert!(!config.purge_css);
    }

    #[test]
    fn stock_config_round_trips() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.images.jpeg_quality, 75);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(&path, "root_ulr = \"typo\"\n").unwrap();
        assert!(matches!(
            load_site_config(&path),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn out_of_range_quality_fails_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(&path, "[images]\njpeg_quality = 0\n").unwrap();
        assert!(matches!(
            load_site_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn bad_retina_size_fails_validation() {
        let config = SiteConfig {
            retina_size: "retina".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn page_heads_load_per_language() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("ru.json"),
            r#"{ "index": { "head": { "description": "Главная", "title": "Дом" } } }"#,
        )
        .unwrap();

        let heads = load_page_heads(tmp.path(), &["ru".to_string()]).unwrap();
        assert_eq!(heads["ru"]["index"].title, "Дом");
        assert_eq!(heads["ru"]["index"].robots, None);
    }

    #[test]
    fn missing_language_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_page_heads(tmp.path(), &["ua".to_string()]).is_err());
    }

    #[test]
    fn placeholders_derive_links() {
        let config = SiteConfig {
            meta_canonical: vec!["index".to_string()],
            ..Default::default()
        };
        let langs = vec!["ru".to_string(), "ua".to_string()];
        let head = PageHead {
            description: "d".into(),
            title: "t".into(),
            robots: None,
        };
        let values = page_placeholders(&config, &langs, "ru", "index", &head);

        assert_eq!(values["robots"], "noindex");
        assert!(values["canonical"].contains("/html/ru/index.html"));
        assert!(values["alternate"].contains(r#"hreflang="ua""#));
        assert!(!values["alternate"].contains(r#"hreflang="ru""#));
        assert_eq!(
            values["linkStyles"],
            r#"<link rel="stylesheet" href="../../css/index.min.css">"#
        );
        assert!(values["linkScripts"].contains("js/index.bundle.js"));
        assert!(values["linkScripts"].contains("defer"));
    }

    #[test]
    fn head_robots_overrides_config() {
        let config = SiteConfig::default();
        let head = PageHead {
            robots: Some("index, follow".to_string()),
            ..Default::default()
        };
        let values = page_placeholders(&config, &[], "ru", "index", &head);
        assert_eq!(values["robots"], "index, follow");
    }
}
