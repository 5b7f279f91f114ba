//! Render requests from fenced code blocks.
//!
//! ````markdown
//! ```openscad alt="Cube with a hole" scale=50 align=center
//! difference() { cube(12, center=true); sphere(8); }
//! ```
//!
//! ```cad file=models/bracket.scad caption="Mounting bracket"
//! ```
//! ````

use std::fs;
use std::path::Path;

use crate::error::RenderError;
use crate::node::{Align, CadOptions, RenderRequest};
use crate::sizing::parse_scale;

/// Fence languages handled as OpenSCAD models.
const CAD_LANGUAGES: [&str; 2] = ["openscad", "cad"];

/// Whether a fence language denotes an OpenSCAD model.
#[must_use]
pub fn is_cad_language(language: &str) -> bool {
    CAD_LANGUAGES.contains(&language)
}

/// Parse fence info string into language and attributes.
///
/// Format: `language [key=value ...]`. Tokens follow shell quoting rules, so
/// `caption="Two words"` keeps its space. Attributes keep their order.
pub fn parse_fence_info(info: &str) -> Result<(String, Vec<(String, String)>), RenderError> {
    let tokens = shlex::split(info)
        .ok_or_else(|| RenderError::Input(format!("unbalanced quotes in fence info '{info}'")))?;
    let mut tokens = tokens.into_iter();
    let language = tokens.next().unwrap_or_default();

    let attrs = tokens
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (token, String::new()),
        })
        .collect();
    Ok((language, attrs))
}

/// A render request with the warnings collected while building it.
#[derive(Debug)]
pub(crate) struct ParsedBlock {
    pub request: RenderRequest,
    pub warnings: Vec<String>,
}

/// Build a render request from a code block.
///
/// `doc_dir` is the document's directory relative to `source_root`; files named
/// by the `file` attribute are resolved against it.
pub(crate) fn parse_block(
    attrs: &[(String, String)],
    body: &str,
    source_root: &Path,
    doc_dir: &Path,
) -> Result<ParsedBlock, RenderError> {
    let mut options = CadOptions::default();
    let mut file = None;
    let mut warnings = Vec::new();

    for (key, value) in attrs {
        match key.as_str() {
            "alt" => options.alt = Some(value.clone()),
            "caption" => options.caption = Some(value.clone()),
            "width" => options.width = Some(value.clone()),
            "height" => options.height = Some(value.clone()),
            "scale" => options.scale = Some(parse_scale(value)?),
            "align" => options.align = Some(Align::parse(value)?),
            "file" => file = Some(value.as_str()),
            _ => warnings.push(format!("ignoring unknown openscad attribute '{key}'")),
        }
    }

    let (content, context_dir) = match file {
        Some(_) if !body.trim().is_empty() => {
            return Err(RenderError::Input(
                "openscad block cannot have both content and a file attribute".to_owned(),
            ));
        }
        Some("") => {
            return Err(RenderError::Input(
                "openscad file attribute is empty".to_owned(),
            ));
        }
        Some(file) => {
            let relative = doc_dir.join(file);
            let content = read_utf8(&source_root.join(&relative))
                .map_err(|err| {
                    RenderError::Input(format!("openscad file \"{file}\" cannot be read: {err}"))
                })?;
            let context_dir = relative.parent().map(Path::to_path_buf).unwrap_or_default();
            (content, context_dir)
        }
        None => {
            let content = body.strip_suffix('\n').unwrap_or(body).to_owned();
            (content, doc_dir.to_path_buf())
        }
    };

    Ok(ParsedBlock {
        request: RenderRequest::new(content, context_dir).with_options(options),
        warnings,
    })
}

fn read_utf8(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}
