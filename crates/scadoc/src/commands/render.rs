//! `scadoc render` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use scadoc_config::Config;
use scadoc_render::{ImageFormat, RenderedArtifact};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// OpenSCAD model to render.
    file: PathBuf,

    /// Output format: png, svg, eps or pdf.
    #[arg(short, long, default_value = "png")]
    format: String,

    /// Directory receiving the artifact (default: the configured images directory).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover scadoc.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl RenderArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;
        let format = ImageFormat::parse(&self.format)?;

        let out_dir = self.output_dir.unwrap_or_else(|| config.images_dir());
        let artifact = render_file(&config, &self.file, format, out_dir)?;

        output.success(&format!("Rendered {}", self.file.display()));
        output.info(&artifact.output_path.display().to_string());
        Ok(())
    }
}

/// Render one model file into `out_dir`.
fn render_file(
    config: &Config,
    file: &Path,
    format: ImageFormat,
    out_dir: PathBuf,
) -> Result<RenderedArtifact, CliError> {
    let content = std::fs::read_to_string(file)
        .map_err(|err| CliError::Validation(format!("cannot read {}: {err}", file.display())))?;
    // Includes resolve next to the model file
    let file = std::path::absolute(file)?;
    let context_dir = file.parent().unwrap_or(Path::new("/"));

    let pipeline = super::pipeline(config, out_dir, PathBuf::new());
    Ok(pipeline.render(&content, context_dir, format)?)
}
