//! Markdown integration for OpenSCAD code blocks.
//!
//! [`CadProcessor`] renders a Markdown document to HTML in three steps:
//! 1. `openscad`/`cad` fenced blocks are swapped for NUL-delimited `OPENSCAD_N` placeholders
//! 2. the remaining events are rendered with `pulldown-cmark`
//! 3. each block is rendered to an HTML fragment and placeholders are replaced
//!    in a single pass
//!
//! A block that fails with a recoverable error is dropped and reported as a
//! warning; operating system errors abort the document.

use std::collections::HashMap;
use std::path::Path;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::chain::Pipeline;
use crate::consts::{PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX};
use crate::directive::{is_cad_language, parse_block, parse_fence_info};
use crate::error::RenderError;
use crate::visit::HtmlVisitor;

/// HTML output and warnings for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Rendered HTML.
    pub html: String,
    /// One message per dropped block or ignored attribute.
    pub warnings: Vec<String>,
}

/// OpenSCAD block taken out of the event stream.
#[derive(Debug)]
struct ExtractedBlock {
    index: usize,
    info: String,
    body: String,
}

/// Markdown to HTML renderer that embeds OpenSCAD models.
///
/// # Example
///
/// ```ignore
/// let processor = CadProcessor::new(&pipeline, "png").with_uri_prefix("_images/");
/// let doc = processor.process("```openscad\ncube(1);\n```\n", Path::new("guide"))?;
/// ```
pub struct CadProcessor<'a> {
    pipeline: &'a Pipeline,
    html_format: String,
    uri_prefix: String,
}

impl<'a> CadProcessor<'a> {
    /// Create a processor for the configured HTML format.
    #[must_use]
    pub fn new(pipeline: &'a Pipeline, html_format: impl Into<String>) -> Self {
        Self {
            pipeline,
            html_format: html_format.into(),
            uri_prefix: String::new(),
        }
    }

    /// Set the prefix joining the page to the artifact directory.
    #[must_use]
    pub fn with_uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.uri_prefix = prefix.into();
        self
    }

    /// Render `markdown` located in `doc_dir` (relative to the source root).
    pub fn process(&self, markdown: &str, doc_dir: &Path) -> Result<RenderedDocument, RenderError> {
        let (events, blocks) = extract_blocks(Parser::new_ext(markdown, parser_options()));

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());

        let visitor = HtmlVisitor::new(self.pipeline, self.html_format.as_str())
            .with_uri_prefix(self.uri_prefix.as_str());
        let mut warnings = Vec::new();
        let mut replacements = Replacements::with_capacity(blocks.len());

        for block in &blocks {
            match self.render_block(&visitor, block, doc_dir, &mut warnings) {
                Ok(fragment) => replacements.add(block.index, fragment),
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(index = block.index, error = %err, "skipping openscad block");
                    warnings.push(err.to_string());
                    replacements.add(block.index, String::new());
                }
                Err(err) => return Err(err),
            }
        }
        replacements.apply(&mut output);

        Ok(RenderedDocument {
            html: output,
            warnings,
        })
    }

    fn render_block(
        &self,
        visitor: &HtmlVisitor<'_>,
        block: &ExtractedBlock,
        doc_dir: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<String, RenderError> {
        let (_, attrs) = parse_fence_info(&block.info)?;
        let parsed = parse_block(
            &attrs,
            &block.body,
            self.pipeline.cache().source_root(),
            doc_dir,
        )?;
        warnings.extend(parsed.warnings);
        visitor.visit(&parsed.request)
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
}

/// Replace OpenSCAD code blocks with placeholders.
fn extract_blocks<'e>(
    parser: impl Iterator<Item = Event<'e>>,
) -> (Vec<Event<'e>>, Vec<ExtractedBlock>) {
    let mut events = Vec::new();
    let mut blocks: Vec<ExtractedBlock> = Vec::new();
    let mut current: Option<ExtractedBlock> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                if current.is_none() && is_cad_language(fence_language(info)) =>
            {
                current = Some(ExtractedBlock {
                    index: blocks.len(),
                    info: info.to_string(),
                    body: String::new(),
                });
            }
            Event::Text(ref text) if current.is_some() => {
                if let Some(block) = current.as_mut() {
                    block.body.push_str(text);
                }
            }
            Event::End(TagEnd::CodeBlock) if current.is_some() => {
                if let Some(block) = current.take() {
                    let line = format!("{}\n", placeholder(block.index));
                    events.push(Event::Html(CowStr::from(line)));
                    blocks.push(block);
                }
            }
            other => events.push(other),
        }
    }

    (events, blocks)
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}{PLACEHOLDER_SUFFIX}")
}

fn fence_language(info: &str) -> &str {
    info.split_whitespace().next().unwrap_or("")
}

/// Placeholder replacements, applied in one scan of the document.
struct Replacements {
    map: HashMap<usize, String>,
}

impl Replacements {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    fn add(&mut self, index: usize, content: String) {
        self.map.insert(index, content);
    }

    /// Replace every placeholder that has an entry; others are kept.
    fn apply(self, html: &mut String) {
        if self.map.is_empty() {
            return;
        }

        let prefix_len = PLACEHOLDER_PREFIX.len();
        let mut result = String::with_capacity(html.len());
        let mut remaining = html.as_str();

        while let Some(start) = remaining.find(PLACEHOLDER_PREFIX) {
            result.push_str(&remaining[..start]);

            let after_prefix = &remaining[start + prefix_len..];
            let Some(end_pos) = after_prefix.find(PLACEHOLDER_SUFFIX) else {
                // Unterminated
                result.push_str(&remaining[start..]);
                remaining = "";
                break;
            };

            let suffix_len = PLACEHOLDER_SUFFIX.len();
            let placeholder = &remaining[start..start + prefix_len + end_pos + suffix_len];
            let replacement = after_prefix[..end_pos]
                .parse::<usize>()
                .ok()
                .and_then(|index| self.map.get(&index));
            match replacement {
                // Drop the newline that ends the placeholder line
                Some(content) => {
                    result.push_str(content);
                    let rest = &after_prefix[end_pos + suffix_len..];
                    remaining = rest.strip_prefix('\n').unwrap_or(rest);
                }
                None => {
                    result.push_str(placeholder);
                    remaining = &after_prefix[end_pos + suffix_len..];
                }
            }
        }

        result.push_str(remaining);
        *html = result;
    }
}
