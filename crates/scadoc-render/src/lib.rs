//! OpenSCAD rendering for scadoc.
//!
//! This crate turns OpenSCAD model source embedded in documentation into image
//! files produced by an external renderer:
//! - [`CacheKey`] and [`RenderCache`]: content-addressed artifacts that are rendered at most once
//! - [`invoke`]: external renderer invocation with failure classification
//! - [`Pipeline`]: format chains with post-processing (EPS to PDF)
//! - [`HtmlVisitor`] and [`print_visit`]: per-output node rendering
//! - [`CadProcessor`]: Markdown integration for `openscad` code blocks
//!
//! # Architecture
//!
//! The crate is organized into modules:
//! - [`format`]: Image formats and the HTML/print dispatch tables
//! - `key`: Cache key derivation
//! - `cache`: Filesystem-backed render cache
//! - `command`: Command templates and tool invocation
//! - `chain`: Format chains and post-processors
//! - `sizing`: Dimension parsing and scale arithmetic
//! - `node`: The embeddable render request and its presentation options
//! - `directive`: Building requests from fenced code block attributes
//! - `visit`: HTML and print output for a single node
//! - `processor`: Markdown placeholder extraction and replacement
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use scadoc_render::{ImageFormat, RenderCache, ToolCommand};
//!
//! let cache = RenderCache::new("build/_images", ToolCommand::from("openscad"));
//! let artifact = cache.resolve("cube(1);", Path::new("guide"), ImageFormat::Png)?;
//! println!("{}", artifact.output_path.display());
//! ```

mod cache;
mod chain;
mod command;
mod consts;
mod directive;
mod error;
pub mod format;
mod html;
mod key;
mod node;
mod processor;
mod sizing;
mod visit;

#[cfg(test)]
mod testing;

pub use cache::{RenderCache, RenderedArtifact};
pub use chain::{FormatChain, Pipeline, PostProcessor};
pub use command::{Launcher, ProcessLauncher, ToolCommand, ToolOutput, invoke, renderer_args};
pub use directive::{is_cad_language, parse_fence_info};
pub use error::RenderError;
pub use format::{HtmlFormat, ImageFormat, PrintFormat};
pub use html::escape_html;
pub use key::CacheKey;
pub use node::{Align, CadOptions, RenderRequest};
pub use processor::{CadProcessor, RenderedDocument};
pub use sizing::{
    Dimension, DisplaySize, ImageSize, display_size, parse_dimension, parse_scale, png_dimensions,
};
pub use visit::{HtmlVisitor, ImageNode, pdf_visit, print_visit};
