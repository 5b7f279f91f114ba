//! Format chains and post-processing.
//!
//! The renderer writes PNG, SVG and EPS directly. Anything else is reached by
//! rendering an intermediate format and converting it with a second tool. The
//! converted file takes the intermediate's name with its extension replaced,
//! so it is cached under the same key:
//!
//! ```text
//! render-{key}.eps  --epstopdf-->  render-{key}.pdf
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{RenderCache, RenderedArtifact, staging_dir};
use crate::command::{ToolCommand, run_tool};
use crate::error::RenderError;
use crate::format::{ImageFormat, PrintFormat};
use crate::key::CacheKey;

/// Second tool converting one rendered format into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessor {
    /// `epstopdf input.eps`, writing `input.pdf` beside it.
    EpsToPdf,
}

impl PostProcessor {
    /// Tool name used in diagnostics.
    #[must_use]
    pub fn tool(self) -> &'static str {
        match self {
            Self::EpsToPdf => "epstopdf",
        }
    }

    /// Format written by the tool.
    #[must_use]
    pub fn target(self) -> ImageFormat {
        match self {
            Self::EpsToPdf => ImageFormat::Pdf,
        }
    }

    /// Some distributions ship the script without the executable bit.
    fn needs_shell_fallback(self) -> bool {
        matches!(self, Self::EpsToPdf)
    }
}

/// Route from the renderer to a requested format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChain {
    /// Format the renderer writes.
    pub intermediate: ImageFormat,
    /// Conversion applied to the intermediate file, if any.
    pub post: Option<PostProcessor>,
}

impl FormatChain {
    /// Create a chain.
    #[must_use]
    pub fn new(intermediate: ImageFormat, post: Option<PostProcessor>) -> Self {
        Self { intermediate, post }
    }

    /// Format at the end of the chain.
    #[must_use]
    pub fn target(self) -> ImageFormat {
        self.post.map_or(self.intermediate, PostProcessor::target)
    }
}

/// Render cache plus the post-processor commands needed to run format chains.
pub struct Pipeline {
    cache: RenderCache,
    epstopdf: ToolCommand,
}

impl Pipeline {
    /// Create a pipeline using the default `epstopdf` command.
    #[must_use]
    pub fn new(cache: RenderCache) -> Self {
        Self {
            cache,
            epstopdf: ToolCommand::from("epstopdf"),
        }
    }

    /// Set the EPS to PDF converter command.
    #[must_use]
    pub fn with_epstopdf(mut self, command: ToolCommand) -> Self {
        self.epstopdf = command;
        self
    }

    /// Underlying render cache.
    #[must_use]
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Render `content` as `format`, converting when the renderer cannot write it.
    pub fn render(
        &self,
        content: &str,
        context_dir: &Path,
        format: ImageFormat,
    ) -> Result<RenderedArtifact, RenderError> {
        self.render_chain(content, context_dir, format.chain())
    }

    /// Render `content` for a print target and return the final file.
    pub fn render_for_target(
        &self,
        content: &str,
        context_dir: &Path,
        target: PrintFormat,
    ) -> Result<PathBuf, RenderError> {
        Ok(self.render_chain(content, context_dir, target.chain())?.output_path)
    }

    /// Run `chain` for `content`.
    ///
    /// An existing converted file short-circuits the whole chain. Otherwise the
    /// intermediate is resolved through the cache and converted in a staging
    /// directory, so the converted name only ever refers to a complete file.
    pub fn render_chain(
        &self,
        content: &str,
        context_dir: &Path,
        chain: FormatChain,
    ) -> Result<RenderedArtifact, RenderError> {
        let Some(post) = chain.post else {
            return self.cache.resolve(content, context_dir, chain.intermediate);
        };
        let target = post.target();

        let key = CacheKey::new(context_dir, content);
        let planned = self.cache.artifact_paths(&key, chain.intermediate)?;
        let converted = planned.output_path.with_extension(target.extension());
        if converted.exists() {
            tracing::debug!(%key, format = target.extension(), "converted artifact cache hit");
            return Ok(RenderedArtifact {
                source_path: planned.source_path,
                output_path: converted,
                format: target,
            });
        }

        let intermediate = self.cache.resolve(content, context_dir, chain.intermediate)?;
        self.convert(post, &intermediate.output_path, &converted)?;

        tracing::info!(
            tool = post.tool(),
            output = %converted.display(),
            "converted rendered model"
        );
        Ok(RenderedArtifact {
            source_path: intermediate.source_path,
            output_path: converted,
            format: target,
        })
    }

    fn command_for(&self, post: PostProcessor) -> &ToolCommand {
        match post {
            PostProcessor::EpsToPdf => &self.epstopdf,
        }
    }

    /// Convert `input` into `converted`, working on a staged copy.
    ///
    /// The tool writes its output beside its input, named by replacing the
    /// extension.
    fn convert(
        &self,
        post: PostProcessor,
        input: &Path,
        converted: &Path,
    ) -> Result<(), RenderError> {
        let staging = staging_dir(converted)?;
        let Some(input_name) = input.file_name() else {
            return Err(RenderError::Input(format!(
                "intermediate artifact {} has no file name",
                input.display()
            )));
        };
        let staged_input = staging.path().join(input_name);
        fs::copy(input, &staged_input)?;

        let command = self.command_for(post);
        let mut args = command.tokenize(post.tool())?;
        args.push(staged_input.to_string_lossy().into_owned());
        run_tool(
            self.cache.launcher(),
            post.tool(),
            command,
            &args,
            None,
            post.needs_shell_fallback(),
        )?;

        let staged_output = staged_input.with_extension(post.target().extension());
        if !staged_output.exists() {
            return Err(RenderError::ToolError {
                tool: post.tool(),
                message: format!(
                    "{} exited successfully but did not write {}",
                    post.tool(),
                    staged_output
                        .file_name()
                        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
                ),
            });
        }
        fs::rename(&staged_output, converted)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::command::Launcher;
    use crate::testing::{FakeLauncher, Step};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn pipeline_with(tmp: &TempDir, launcher: &Arc<FakeLauncher>) -> Pipeline {
        let cache = RenderCache::new(tmp.path().join("out"), ToolCommand::from("openscad"))
            .with_source_root(tmp.path())
            .with_launcher(Arc::clone(launcher) as Arc<dyn Launcher>);
        Pipeline::new(cache)
    }

    #[test]
    fn test_chain_target() {
        assert_eq!(ImageFormat::Pdf.chain().target(), ImageFormat::Pdf);
        assert_eq!(ImageFormat::Svg.chain().target(), ImageFormat::Svg);
    }

    #[test]
    fn test_render_pdf_converts_eps() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::copying());
        let pipeline = pipeline_with(&tmp, &launcher);

        let artifact = pipeline
            .render("cube(1);", Path::new(""), ImageFormat::Pdf)
            .unwrap();

        assert_eq!(artifact.format, ImageFormat::Pdf);
        assert_eq!(artifact.output_path.extension().unwrap(), "pdf");
        assert!(artifact.output_path.exists());
        assert!(artifact.output_path.with_extension("eps").exists());

        let calls = launcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args[0], "epstopdf");
        assert_eq!(calls[1].args.len(), 2);
        assert!(calls[1].args[1].ends_with(".eps"));
        assert_eq!(calls[1].cwd, None);
    }

    #[test]
    fn test_render_pdf_second_call_is_cached() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::copying());
        let pipeline = pipeline_with(&tmp, &launcher);

        let first = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Pdf)
            .unwrap();
        let second = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Pdf)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(launcher.calls().len(), 2);
    }

    #[test]
    fn test_render_pdf_short_circuits_on_converted_file() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::copying());
        let pipeline = pipeline_with(&tmp, &launcher);
        let key = CacheKey::new(Path::new(""), "cube(1);");
        let planned = pipeline
            .cache()
            .artifact_paths(&key, ImageFormat::Eps)
            .unwrap();
        let pdf = planned.output_path.with_extension("pdf");
        fs::create_dir_all(pdf.parent().unwrap()).unwrap();
        fs::write(&pdf, b"%PDF").unwrap();

        let path = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Pdf)
            .unwrap();

        assert_eq!(path, pdf);
        assert!(launcher.calls().is_empty());
    }

    #[test]
    fn test_render_without_post_processor() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::copying());
        let pipeline = pipeline_with(&tmp, &launcher);

        let eps = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Eps)
            .unwrap();

        assert_eq!(eps.extension().unwrap(), "eps");
        assert_eq!(launcher.calls().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_render_pdf_retries_converter_through_shell() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::new(vec![
            Step::WriteOutput,
            Step::OsError(libc::ENOEXEC),
            Step::WriteOutput,
        ]));
        let pipeline = pipeline_with(&tmp, &launcher);

        let path = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Pdf)
            .unwrap();

        assert!(path.exists());
        let calls = launcher.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].args[..2], ["sh", "-c"]);
        assert_eq!(calls[2].args[3], "epstopdf");
    }

    #[test]
    fn test_render_pdf_converter_missing() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::new(vec![Step::WriteOutput, Step::NotFound]));
        let pipeline = pipeline_with(&tmp, &launcher);

        let err = pipeline
            .render("cube(1);", Path::new(""), ImageFormat::Pdf)
            .unwrap_err();

        match err {
            RenderError::ToolMissing { tool, command } => {
                assert_eq!(tool, "epstopdf");
                assert_eq!(command, "epstopdf");
            }
            other => panic!("expected ToolMissing, got {other:?}"),
        }
        let key = CacheKey::new(Path::new(""), "cube(1);");
        let planned = pipeline
            .cache()
            .artifact_paths(&key, ImageFormat::Pdf)
            .unwrap();
        assert!(!planned.output_path.exists());
    }

    #[test]
    fn test_render_pdf_converter_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(FakeLauncher::new(vec![Step::WriteOutput, Step::Succeed]));
        let pipeline = pipeline_with(&tmp, &launcher);

        let err = pipeline
            .render("cube(1);", Path::new(""), ImageFormat::Pdf)
            .unwrap_err();

        assert!(matches!(err, RenderError::ToolError { tool: "epstopdf", .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_pdf_with_real_processes() {
        let tmp = TempDir::new().unwrap();
        let cache = RenderCache::new(
            tmp.path().join("out"),
            ToolCommand::from(vec![
                "sh".to_owned(),
                "-c".to_owned(),
                "printf '%%!PS' > \"$1\"".to_owned(),
            ]),
        )
        .with_source_root(tmp.path());
        // Converter gets the EPS path as $0
        let pipeline = Pipeline::new(cache).with_epstopdf(ToolCommand::from(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            "cp \"$0\" \"${0%.eps}.pdf\"".to_owned(),
        ]));

        let path = pipeline
            .render_for_target("cube(1);", Path::new(""), PrintFormat::Pdf)
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "%!PS");
    }
}
