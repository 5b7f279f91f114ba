//! Per-output rendering of a single node.
//!
//! HTML pages embed a PNG preview (optionally inside an SVG `<object>`). Print
//! builds receive an [`ImageNode`] that replaces the model in the document tree.

use std::fs;
use std::path::Path;

use crate::chain::Pipeline;
use crate::error::RenderError;
use crate::format::{HtmlFormat, ImageFormat, PrintFormat};
use crate::html::{figure, paragraph, png_tag, svg_style, svg_tag};
use crate::node::{CadOptions, RenderRequest};
use crate::sizing::{display_size, read_png_size};

/// Renders nodes into HTML fragments.
pub struct HtmlVisitor<'a> {
    pipeline: &'a Pipeline,
    /// `openscad.html_format` value, validated per node.
    format: String,
    /// Prepended to artifact file names in `src`/`data` attributes.
    uri_prefix: String,
}

impl<'a> HtmlVisitor<'a> {
    /// Create a visitor for the configured HTML format.
    #[must_use]
    pub fn new(pipeline: &'a Pipeline, format: impl Into<String>) -> Self {
        Self {
            pipeline,
            format: format.into(),
            uri_prefix: String::new(),
        }
    }

    /// Set the prefix joining a page to the artifact directory (e.g., `../_images/`).
    #[must_use]
    pub fn with_uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.uri_prefix = prefix.into();
        self
    }

    /// Render `request` and return its HTML fragment.
    pub fn visit(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let format = HtmlFormat::parse(&self.format)?;

        let mut png = None;
        let mut svg = None;
        for &file_format in format.file_formats() {
            let artifact =
                self.pipeline
                    .render(request.content(), request.context_dir(), file_format)?;
            match file_format {
                ImageFormat::Svg => svg = Some(artifact.output_path),
                _ => png = Some(artifact.output_path),
            }
        }
        let Some(png) = png else {
            return Err(RenderError::Input(format!(
                "html format '{}' has no preview image",
                self.format
            )));
        };

        let options = request.options();
        let size = if options.has_sizing() {
            let native = read_png_size(&png)?;
            Some(display_size(
                native,
                options.width.as_deref(),
                options.height.as_deref(),
                options.scale,
            )?)
        } else {
            None
        };
        let mut tag = png_tag(&self.uri(&png), request.alt(), size.as_ref());

        if let Some(svg) = svg {
            let text = String::from_utf8_lossy(&fs::read(&svg)?).into_owned();
            tag = svg_tag(&self.uri(&svg), svg_style(&text), &tag);
        }

        let html = paragraph(&tag);
        if options.is_figure() {
            Ok(figure(&html, options.align, options.caption.as_deref()))
        } else {
            Ok(html)
        }
    }

    fn uri(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        format!("{}{name}", self.uri_prefix)
    }
}

/// Image reference substituted for a node in print output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    /// Path of the rendered file.
    pub uri: String,
    /// Alternative text; the model source unless overridden.
    pub alt: String,
    /// Presentation options carried over from the node.
    pub attributes: CadOptions,
}

/// Render `request` for a print build in the configured `print_format`.
pub fn print_visit(
    pipeline: &Pipeline,
    print_format: &str,
    request: &RenderRequest,
) -> Result<ImageNode, RenderError> {
    let target = PrintFormat::parse(print_format)?;
    let path = pipeline.render_for_target(request.content(), request.context_dir(), target)?;
    Ok(ImageNode {
        uri: path.to_string_lossy().into_owned(),
        alt: request.alt().to_owned(),
        attributes: request.options().clone(),
    })
}

/// Render `request` for a PDF builder, which always embeds PDF.
///
/// Only the alternative text is kept.
pub fn pdf_visit(pipeline: &Pipeline, request: &RenderRequest) -> Result<ImageNode, RenderError> {
    let artifact = pipeline.render(request.content(), request.context_dir(), ImageFormat::Pdf)?;
    Ok(ImageNode {
        uri: artifact.output_path.to_string_lossy().into_owned(),
        alt: request.alt().to_owned(),
        attributes: CadOptions::default(),
    })
}
