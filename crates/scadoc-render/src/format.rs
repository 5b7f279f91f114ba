//! Image formats and the per-output dispatch tables.
//!
//! The renderer writes one [`ImageFormat`] per invocation. Output targets
//! request formats through two fixed tables:
//! - [`HtmlFormat`]: which files an HTML page needs (a PNG preview, optionally an SVG)
//! - [`PrintFormat`]: which file a print build embeds, and how it is reached

use crate::chain::{FormatChain, PostProcessor};
use crate::error::RenderError;

/// File format written by the renderer or a post-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Raster preview.
    Png,
    /// Vector image for browsers.
    Svg,
    /// Vector image for print.
    Eps,
    /// Print-ready document converted from EPS.
    Pdf,
}

impl ImageFormat {
    const VALID: &'static str = "'png', 'svg', 'eps', 'pdf'";

    /// Parse a format name.
    pub fn parse(s: &str) -> Result<Self, RenderError> {
        match s {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "eps" => Ok(Self::Eps),
            "pdf" => Ok(Self::Pdf),
            _ => Err(RenderError::UnsupportedFormat {
                setting: "format",
                value: s.to_owned(),
                valid: Self::VALID,
            }),
        }
    }

    /// File extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Eps => "eps",
            Self::Pdf => "pdf",
        }
    }

    /// How to reach this format: the renderer cannot write PDF directly.
    #[must_use]
    pub fn chain(self) -> FormatChain {
        match self {
            Self::Pdf => FormatChain::new(Self::Eps, Some(PostProcessor::EpsToPdf)),
            other => FormatChain::new(other, None),
        }
    }
}

/// Output format for HTML builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlFormat {
    /// `<img>` tag referencing a PNG (default).
    #[default]
    Png,
    /// `<object>` referencing an SVG, with the PNG tag as fallback content.
    Svg,
}

impl HtmlFormat {
    const VALID: &'static str = "'png', 'svg'";

    /// Parse the `openscad.html_format` setting.
    pub fn parse(s: &str) -> Result<Self, RenderError> {
        match s {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            _ => Err(RenderError::UnsupportedFormat {
                setting: "openscad.html_format",
                value: s.to_owned(),
                valid: Self::VALID,
            }),
        }
    }

    /// Files that must be rendered for this format, in rendering order.
    #[must_use]
    pub fn file_formats(self) -> &'static [ImageFormat] {
        match self {
            Self::Png => &[ImageFormat::Png],
            Self::Svg => &[ImageFormat::Png, ImageFormat::Svg],
        }
    }
}

/// Output format for print (LaTeX-style) builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintFormat {
    /// Encapsulated PostScript straight from the renderer.
    Eps,
    /// EPS converted to PDF by a post-processor.
    Pdf,
    /// PNG straight from the renderer (default).
    #[default]
    Png,
}

impl PrintFormat {
    const VALID: &'static str = "'eps', 'pdf', 'png'";

    /// Parse the `openscad.print_format` setting.
    pub fn parse(s: &str) -> Result<Self, RenderError> {
        match s {
            "eps" => Ok(Self::Eps),
            "pdf" => Ok(Self::Pdf),
            "png" => Ok(Self::Png),
            _ => Err(RenderError::UnsupportedFormat {
                setting: "openscad.print_format",
                value: s.to_owned(),
                valid: Self::VALID,
            }),
        }
    }

    /// Final file format embedded in the document.
    #[must_use]
    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Eps => ImageFormat::Eps,
            Self::Pdf => ImageFormat::Pdf,
            Self::Png => ImageFormat::Png,
        }
    }

    /// Intermediate format and post-processor for this target.
    #[must_use]
    pub fn chain(self) -> FormatChain {
        self.image_format().chain()
    }
}
