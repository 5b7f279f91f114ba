//! `scadoc build` command implementation.

use std::fs;
use std::path::{Component, Path, PathBuf};

use clap::Args;
use scadoc_config::{CliSettings, Config};
use scadoc_render::{CadProcessor, escape_html};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Markdown source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Output directory for HTML pages (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// HTML output format: png or svg (overrides config).
    #[arg(long)]
    html_format: Option<String>,

    /// OpenSCAD command line (overrides config).
    #[arg(long, env = "SCADOC_OPENSCAD")]
    openscad: Option<String>,

    /// Path to configuration file (default: auto-discover scadoc.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl BuildArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            command: self.openscad,
            html_format: self.html_format,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let source_dir = &config.docs_resolved.source_dir;
        let output_dir = &config.docs_resolved.output_dir;
        if !source_dir.is_dir() {
            return Err(CliError::Validation(format!(
                "source directory not found: {}",
                source_dir.display()
            )));
        }

        output.info(&format!("Source: {}", source_dir.display()));
        output.info(&format!("Output: {}", output_dir.display()));

        let summary = build_site(&config, &output)?;

        output.success(&format!(
            "Built {} pages to {}",
            summary.pages,
            output_dir.display()
        ));
        if summary.warnings > 0 {
            output.warning(&format!("{} warnings", summary.warnings));
        }
        Ok(())
    }
}

/// Counts reported after a build.
#[derive(Debug, Default, PartialEq, Eq)]
struct BuildSummary {
    pages: usize,
    warnings: usize,
}

/// Render every Markdown page under the source directory.
fn build_site(config: &Config, output: &Output) -> Result<BuildSummary, CliError> {
    let source_dir = &config.docs_resolved.source_dir;
    let output_dir = &config.docs_resolved.output_dir;
    let pipeline = super::pipeline(config, config.images_dir(), source_dir.clone());

    let mut summary = BuildSummary::default();
    for page in markdown_pages(source_dir)? {
        let Ok(relative) = page.strip_prefix(source_dir) else {
            continue;
        };
        tracing::debug!(page = %relative.display(), "rendering page");

        let markdown = fs::read_to_string(&page)?;
        let doc_dir = relative.parent().unwrap_or(Path::new(""));
        let processor = CadProcessor::new(&pipeline, config.openscad.html_format.as_str())
            .with_uri_prefix(uri_prefix(relative, &config.openscad.images_dir));
        let doc = processor.process(&markdown, doc_dir)?;

        for warning in &doc.warnings {
            output.warning(&format!("{}: {warning}", relative.display()));
        }
        summary.warnings += doc.warnings.len();

        let dest = output_dir.join(relative).with_extension("html");
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, html_page(relative, &doc.html))?;
        summary.pages += 1;
    }

    Ok(summary)
}

/// Markdown files under `source_dir`, sorted.
fn markdown_pages(source_dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let root = glob::Pattern::escape(&source_dir.to_string_lossy());
    let mut pages = Vec::new();
    for entry in glob::glob(&format!("{root}/**/*.md"))? {
        pages.push(entry?);
    }
    pages.sort();
    Ok(pages)
}

/// Relative link from a page to the artifact directory.
///
/// `guide/intro.md` with `_images` gives `../_images/`.
fn uri_prefix(page: &Path, images_dir: &str) -> String {
    let depth = page
        .parent()
        .map_or(0, |dir| {
            dir.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        });
    let images_dir = images_dir.trim_end_matches('/');
    format!("{}{images_dir}/", "../".repeat(depth))
}

/// Standalone HTML document around a rendered page body.
fn html_page(page: &Path, body: &str) -> String {
    let title = page
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(&title)
    )
}
