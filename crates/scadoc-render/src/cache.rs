//! Content-addressed render cache.
//!
//! [`RenderCache`] maps a model source and its include context to artifact
//! files in an output directory:
//!
//! ```text
//! {out_dir}/
//! +-- render-{key}.scad      # model source, written verbatim
//! +-- render-{key}.png       # one file per rendered format
//! +-- render-{key}.svg
//! ```
//!
//! The filesystem is the only state. Every lookup checks whether the output
//! file exists, so the cache survives crashes and is shared by concurrent
//! build processes using the same directory. Files only appear under their
//! final name through a rename from a private staging directory, so an
//! existing artifact is always complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::{Launcher, ProcessLauncher, RENDERER, ToolCommand, invoke};
use crate::consts::{FILE_PREFIX, SOURCE_EXTENSION, STAGING_PREFIX};
use crate::error::RenderError;
use crate::format::ImageFormat;
use crate::key::CacheKey;

/// Files belonging to one rendered format of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Model source file passed to the renderer.
    pub source_path: PathBuf,
    /// Rendered image.
    pub output_path: PathBuf,
    /// Format of `output_path`.
    pub format: ImageFormat,
}

/// Filesystem-backed cache of rendered models.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use scadoc_render::{ImageFormat, RenderCache, ToolCommand};
///
/// let cache = RenderCache::new("build/_images", ToolCommand::from("openscad"))
///     .with_source_root("docs");
/// let artifact = cache.resolve("cube(1);", Path::new("guide"), ImageFormat::Png)?;
/// ```
pub struct RenderCache {
    /// Directory holding sources and artifacts.
    out_dir: PathBuf,
    /// Directory that request context directories are relative to.
    source_root: PathBuf,
    /// Renderer command template.
    renderer: ToolCommand,
    /// Process launcher (reused for post-processors).
    launcher: Arc<dyn Launcher>,
}

impl RenderCache {
    /// Create a cache writing to `out_dir` and rendering with `renderer`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, renderer: ToolCommand) -> Self {
        Self {
            out_dir: out_dir.into(),
            source_root: PathBuf::from("."),
            renderer,
            launcher: Arc::new(ProcessLauncher),
        }
    }

    /// Set the directory that context directories are resolved against.
    ///
    /// Default is the current directory.
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    /// Replace the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Directory holding sources and artifacts.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Directory that context directories are resolved against.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub(crate) fn launcher(&self) -> &dyn Launcher {
        &*self.launcher
    }

    /// Absolute source and output paths for `key` in `format`.
    ///
    /// Nothing is read or written; the paths are handed to processes running
    /// in other directories.
    pub fn artifact_paths(
        &self,
        key: &CacheKey,
        format: ImageFormat,
    ) -> std::io::Result<RenderedArtifact> {
        let out_dir = std::path::absolute(&self.out_dir)?;
        Ok(RenderedArtifact {
            source_path: out_dir.join(source_file_name(key)),
            output_path: out_dir.join(output_file_name(key, format)),
            format,
        })
    }

    /// Return the artifact for `content` in `format`, rendering it on a miss.
    ///
    /// A hit returns immediately without launching anything. On a miss the
    /// source is written, the renderer runs with `source_root/context_dir` as
    /// its working directory, and the output is moved into place. Failed
    /// renders leave no output file, so the next build retries.
    pub fn resolve(
        &self,
        content: &str,
        context_dir: &Path,
        format: ImageFormat,
    ) -> Result<RenderedArtifact, RenderError> {
        let key = CacheKey::new(context_dir, content);
        let artifact = self.artifact_paths(&key, format)?;

        if artifact.output_path.exists() {
            tracing::debug!(%key, format = format.extension(), "render cache hit");
            return Ok(artifact);
        }

        let staging = staging_dir(&artifact.output_path)?;

        let staged_source = staging.path().join(source_file_name(&key));
        fs::write(&staged_source, content.as_bytes())?;
        fs::rename(&staged_source, &artifact.source_path)?;

        let staged_output = staging.path().join(output_file_name(&key, format));
        let cwd = self.source_root.join(context_dir);
        invoke(
            self.launcher(),
            &self.renderer,
            &artifact.source_path,
            &staged_output,
            &cwd,
        )?;

        if !staged_output.exists() {
            return Err(RenderError::ToolError {
                tool: RENDERER,
                message: format!(
                    "{RENDERER} exited successfully but did not write a {} file",
                    format.extension()
                ),
            });
        }
        fs::rename(&staged_output, &artifact.output_path)?;

        tracing::info!(
            %key,
            output = %artifact.output_path.display(),
            "rendered OpenSCAD model"
        );
        Ok(artifact)
    }
}

/// Create a private staging directory next to `artifact`.
///
/// Files are moved out of it with a rename, which is atomic because both
/// sides live on the same filesystem. The directory is removed on drop.
pub(crate) fn staging_dir(artifact: &Path) -> std::io::Result<tempfile::TempDir> {
    let dir = artifact.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(dir)
}

fn source_file_name(key: &CacheKey) -> String {
    format!("{FILE_PREFIX}{key}.{SOURCE_EXTENSION}")
}

fn output_file_name(key: &CacheKey, format: ImageFormat) -> String {
    format!("{FILE_PREFIX}{key}.{}", format.extension())
}
