use clap::{Parser, Subcommand};
use sitemill::paths::ProjectPaths;
use sitemill::tasks::{self, Mode};
use std::path::PathBuf;
use std::process::ExitCode;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup — trivial, called exactly once
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "sitemill")]
#[command(about = "Asset pipeline for multilingual static sites")]
#[command(long_about = "\
Asset pipeline for multilingual static sites

One source tree becomes a deployable dist/ tree: per-language HTML with
<picture> markup, plain and minified CSS, WebP conversions of raster
images, and SVG sprite sheets.

Source structure:

  src/
  ├── html/                  # Pages; templates/ holds @@include partials
  ├── scss/                  # Root stylesheets (one per page)
  ├── js/                    # Bundle entry points
  └── assets/
      ├── img/               # Images (svgIcons/{mono,multi}/ = sprite sources)
      ├── fonts/
      ├── data/
      │   └── pagesVersions/ # <lang>.json per-page head data
      └── utils/             # robots.txt, favicons... copied to dist root

Pages use @@include(\"partial.html\") and @@placeholders (title,
description, linkStyles, alternate...) filled per language from
pagesVersions data and site.toml.

Run 'sitemill gen-config' to generate a documented site.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Source directory
    #[arg(long, default_value = "src", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Directory for intermediate files (dev change gating)
    #[arg(long, default_value = ".sitemill-temp", global = true)]
    temp: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fast development build: cheap encodes, readable output, change gating
    Dev,
    /// Production build: tuned encodes, minification, optional purge and archives
    Build,
    /// Remove dist, temp and archives
    Clean,
    /// Validate config and source layout without building
    Check,
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("cannot determine working directory: {err}");
            return ExitCode::FAILURE;
        }
    };
    let paths = ProjectPaths::new(&root, &cli.source, &cli.output, &cli.temp);

    let result = match cli.command {
        Command::Dev => tasks::run(Mode::Dev, paths),
        Command::Build => {
            let r = tasks::run(Mode::Build, paths.clone());
            if r.is_ok() {
                println!("==> Build complete: {}", paths.dist.display());
            }
            r
        }
        Command::Clean => tasks::clean(&paths),
        Command::Check => {
            let r = tasks::check(&paths);
            if r.is_ok() {
                println!("==> Project is valid");
            }
            r
        }
        Command::GenConfig => {
            print!("{}", sitemill::config::stock_config_toml());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
