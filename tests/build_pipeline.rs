//! Full-pipeline test: a realistic source tree goes in, a deployable
//! dist tree comes out.

use image::{DynamicImage, RgbImage};
use sitemill::paths::ProjectPaths;
use sitemill::tasks::{self, Mode};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="@@lang">
<head>
    <meta charset="utf-8">
    <meta name="description" content="@@description">
    <meta name="robots" content="@@robots">
    <title>@@title</title>
    @@canonical
    @@alternate
    @@linkStyles
    @@linkScripts
</head>
<body>
    @@include("header.html")
    <main class="content">
        <img
            class="hero"
            src="../../assets/img/photo.jpg"
            alt="">
    </main>
</body>
</html>
"#;

fn seed_project(tmp: &TempDir) -> ProjectPaths {
    let root = tmp.path();
    let src = root.join("src");

    fs::create_dir_all(src.join("html/templates")).unwrap();
    fs::write(src.join("html/index.html"), PAGE).unwrap();
    fs::create_dir_all(src.join("html/about")).unwrap();
    fs::write(
        src.join("html/about/team.html"),
        "<html lang=\"@@lang\"><body><p class=\"team\">@@title</p></body></html>\n",
    )
    .unwrap();
    fs::write(
        src.join("html/templates/header.html"),
        "<header class=\"site-header\"><h1>@@title</h1></header>",
    )
    .unwrap();

    fs::create_dir_all(src.join("scss")).unwrap();
    fs::write(
        src.join("scss/index.scss"),
        ".site-header { color: #222; h1 { margin: 0; } }\n.content { padding: 1rem; }\n",
    )
    .unwrap();

    fs::create_dir_all(src.join("js")).unwrap();
    fs::write(src.join("js/index.js"), "console.log('hi');\n").unwrap();

    fs::create_dir_all(src.join("assets/img/svgIcons/mono")).unwrap();
    let photo = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([180, 90, 30])));
    photo.save(src.join("assets/img/photo.jpg")).unwrap();
    fs::write(
        src.join("assets/img/svgIcons/mono/arrow.svg"),
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><path fill="#000" d="M0 0h24v24H0z"/></svg>"##,
    )
    .unwrap();

    fs::create_dir_all(src.join("assets/fonts")).unwrap();
    fs::write(src.join("assets/fonts/body.woff2"), b"\x77\x4f\x46\x32").unwrap();

    fs::create_dir_all(src.join("assets/data/pagesVersions")).unwrap();
    fs::write(
        src.join("assets/data/pagesVersions/ru.json"),
        r#"{
            "index": { "head": { "description": "Главная страница", "title": "Дом" } },
            "team": { "head": { "description": "Команда", "title": "Команда" } }
        }"#,
    )
    .unwrap();
    fs::write(
        src.join("assets/data/pagesVersions/ua.json"),
        r#"{
            "index": { "head": { "description": "Головна сторінка", "title": "Дім" } },
            "team": { "head": { "description": "Команда", "title": "Команда" } }
        }"#,
    )
    .unwrap();

    fs::create_dir_all(src.join("assets/utils")).unwrap();
    fs::write(src.join("assets/utils/robots.txt"), "User-agent: *\n").unwrap();

    fs::write(
        root.join("site.toml"),
        "root_url = \"https://site.example\"\nmeta_canonical = [\"index\"]\n",
    )
    .unwrap();

    ProjectPaths::new(
        root,
        Path::new("src"),
        Path::new("dist"),
        Path::new(".sitemill-temp"),
    )
}

#[test]
fn build_produces_deployable_tree() {
    let tmp = TempDir::new().unwrap();
    let paths = seed_project(&tmp);

    tasks::run(Mode::Build, paths.clone()).unwrap();

    // Per-language pages, fully substituted.
    let ru = fs::read_to_string(paths.dist.join("html/ru/index.html")).unwrap();
    assert!(ru.contains(r#"lang="ru""#));
    assert!(ru.contains("Главная страница"));
    assert!(ru.contains("<title>Дом</title>"));
    assert!(ru.contains(r#"content="noindex""#));
    assert!(ru.contains(r#"<link rel="canonical" href="https://site.example/html/ru/index.html">"#));
    assert!(ru.contains(r#"hreflang="ua""#));
    assert!(!ru.contains(r#"hreflang="ru""#));
    assert!(ru.contains(r#"<link rel="stylesheet" href="../../css/index.min.css">"#));
    assert!(ru.contains(r#"<script src="../../js/index.bundle.js" defer></script>"#));
    assert!(!ru.contains("@@"));

    // Partial expanded, with the page's own placeholders filled.
    assert!(ru.contains(r#"<header class="site-header"><h1>Дом</h1></header>"#));

    // Picture rewrite kicked in because the webp sibling exists on disk.
    assert!(ru.contains("<picture>"));
    assert!(ru.contains(r#"<source srcset="../../assets/img/photo.webp" type="image/webp">"#));
    assert!(ru.contains(r#"src="../../assets/img/photo.jpg""#));

    // Build output is cleaned of comments and inter-tag gaps.
    assert!(!ru.contains(">\n<"));

    let ua = fs::read_to_string(paths.dist.join("html/ua/index.html")).unwrap();
    assert!(ua.contains("Головна сторінка"));
    assert!(ua.contains(r#"hreflang="ru""#));

    // Pages nested under html/ build too, flat per language.
    let team = fs::read_to_string(paths.dist.join("html/ru/team.html")).unwrap();
    assert!(team.contains(r#"lang="ru""#));
    assert!(team.contains(r#"<p class="team">Команда</p>"#));

    // Stylesheets: plain and minified variants from one pass.
    let css = fs::read_to_string(paths.dist.join("css/index.css")).unwrap();
    let min = fs::read_to_string(paths.dist.join("css/index.min.css")).unwrap();
    assert!(css.contains(".site-header"));
    assert!(min.contains(".site-header{"));
    assert!(min.len() <= css.len());

    // Images: original plus webp conversion.
    assert!(paths.dist.join("assets/img/photo.jpg").is_file());
    let webp = fs::read(paths.dist.join("assets/img/photo.webp")).unwrap();
    assert_eq!(&webp[0..4], b"RIFF");
    assert_eq!(&webp[8..12], b"WEBP");

    // Sprite sheet keyed by icon basename.
    let sprite =
        fs::read_to_string(paths.dist.join("assets/img/svgIcons/sprite.mono.svg")).unwrap();
    assert!(sprite.contains(r#"<symbol id="arrow""#));
    assert!(sprite.contains(r#"style="display: none;""#));
    assert!(!sprite.contains("fill="));

    // Copy pipes.
    assert!(paths.dist.join("js/index.bundle.js").is_file());
    assert!(paths.dist.join("assets/fonts/body.woff2").is_file());
    assert!(paths.dist.join("assets/data/pagesVersions/ru.json").is_file());
    assert_eq!(
        fs::read_to_string(paths.dist.join("robots.txt")).unwrap(),
        "User-agent: *\n"
    );

    // No archives unless asked for.
    assert!(!paths.zip_dist_target().exists());
}

#[test]
fn dev_build_keeps_output_readable() {
    let tmp = TempDir::new().unwrap();
    let paths = seed_project(&tmp);

    tasks::run(Mode::Dev, paths.clone()).unwrap();

    let ru = fs::read_to_string(paths.dist.join("html/ru/index.html")).unwrap();
    // Dev output keeps line structure.
    assert!(ru.contains('\n'));
    assert!(ru.contains("<picture>"));

    // Temp tree holds the gating copies.
    assert!(paths.temp.join("html/ru/index.html").is_file());
    assert!(paths.temp.join("css/index.css").is_file());

    // Both stylesheet variants exist in dev too.
    assert!(paths.dist.join("css/index.min.css").is_file());
}

#[test]
fn archive_flag_emits_zips() {
    let tmp = TempDir::new().unwrap();
    let paths = seed_project(&tmp);
    fs::write(
        tmp.path().join("site.toml"),
        "root_url = \"https://site.example\"\narchive = true\n",
    )
    .unwrap();

    tasks::run(Mode::Build, paths.clone()).unwrap();

    assert!(paths.zip_dist_target().is_file());
    assert!(paths.zip_project_target().is_file());

    // The project archive carries sources but no build products.
    let file = fs::File::open(paths.zip_project_target()).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"src/html/index.html".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("dist/")));
}

#[test]
fn preflight_check_accepts_seeded_project() {
    let tmp = TempDir::new().unwrap();
    let paths = seed_project(&tmp);
    tasks::check(&paths).unwrap();
}
