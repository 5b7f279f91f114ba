//! The embeddable OpenSCAD node.

use std::path::{Path, PathBuf};

use crate::error::RenderError;

/// Horizontal placement of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Float left.
    Left,
    /// Centered.
    Center,
    /// Float right.
    Right,
}

impl Align {
    /// Parse an `align` option value.
    pub fn parse(s: &str) -> Result<Self, RenderError> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(RenderError::Input(format!(
                "invalid align '{s}': expected one of 'left', 'center', 'right'"
            ))),
        }
    }

    /// Option value, also used in the `align-*` CSS class.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Presentation options of a node.
///
/// Width and height stay unparsed until an output needs them, so a malformed
/// value only affects outputs that use it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CadOptions {
    /// Alternative text; defaults to the model source.
    pub alt: Option<String>,
    /// Figure caption.
    pub caption: Option<String>,
    /// Display width, `<integer><optional unit>`.
    pub width: Option<String>,
    /// Display height, `<integer><optional unit>`.
    pub height: Option<String>,
    /// Scale percentage.
    pub scale: Option<u32>,
    /// Figure alignment.
    pub align: Option<Align>,
}

impl CadOptions {
    /// Whether any of width, height or scale is set.
    #[must_use]
    pub fn has_sizing(&self) -> bool {
        self.width.is_some() || self.height.is_some() || self.scale.is_some()
    }

    /// Whether the node is wrapped in a figure.
    #[must_use]
    pub fn is_figure(&self) -> bool {
        self.caption.is_some() || self.align.is_some()
    }
}

/// Model source to render, with the directory its includes resolve against.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    content: String,
    context_dir: PathBuf,
    options: CadOptions,
}

impl RenderRequest {
    /// Create a request with default options.
    ///
    /// `context_dir` is relative to the render cache's source root.
    #[must_use]
    pub fn new(content: impl Into<String>, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            content: content.into(),
            context_dir: context_dir.into(),
            options: CadOptions::default(),
        }
    }

    /// Replace the presentation options.
    #[must_use]
    pub fn with_options(mut self, options: CadOptions) -> Self {
        self.options = options;
        self
    }

    /// Model source.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Include directory.
    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// Presentation options.
    #[must_use]
    pub fn options(&self) -> &CadOptions {
        &self.options
    }

    /// Alternative text, falling back to the model source.
    #[must_use]
    pub fn alt(&self) -> &str {
        self.options.alt.as_deref().unwrap_or(&self.content)
    }
}
