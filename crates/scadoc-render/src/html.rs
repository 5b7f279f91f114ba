//! HTML fragments for rendered models.

use std::sync::LazyLock;

use regex::Regex;

use crate::node::Align;
use crate::sizing::DisplaySize;

/// Attributes of the root `<svg>` element.
static SVG_ROOT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b([^<>]+)").unwrap());

static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bstyle=['"]([^'"]+)"#).unwrap());

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// `<img>` tag for a PNG preview.
///
/// With a display size the image links to itself at full size.
pub(crate) fn png_tag(src: &str, alt: &str, size: Option<&DisplaySize>) -> String {
    let src = escape_html(src);
    let alt = escape_html(alt);
    match size {
        None => format!("<img src=\"{src}\" alt=\"{alt}\" />\n"),
        Some(size) => format!(
            "<a href=\"{src}\"><img src=\"{src}\" alt=\"{alt}\" width=\"{}\" height=\"{}\"/></a>\n",
            escape_html(&size.width.to_string()),
            escape_html(&size.height.to_string()),
        ),
    }
}

/// Inline `style` of the root `<svg>` element, if any.
///
/// The renderer puts the drawing size there; copying it to the `<object>`
/// gives the embed enough room.
pub(crate) fn svg_style(svg: &str) -> Option<&str> {
    let attrs = SVG_ROOT_RE.captures(svg)?.get(1)?.as_str();
    Some(STYLE_ATTR_RE.captures(attrs)?.get(1)?.as_str())
}

/// `<object>` embedding an SVG, with `fallback` shown by browsers that cannot.
pub(crate) fn svg_tag(data: &str, style: Option<&str>, fallback: &str) -> String {
    format!(
        "<object data=\"{}\" type=\"image/svg+xml\" style=\"{}\">\n{fallback}</object>",
        escape_html(data),
        escape_html(style.unwrap_or_default()),
    )
}

/// Paragraph wrapping a rendered model.
pub(crate) fn paragraph(inner: &str) -> String {
    format!("<p class=\"openscad\">{inner}</p>\n")
}

/// Figure wrapping `body`, with an optional caption.
pub(crate) fn figure(body: &str, align: Option<Align>, caption: Option<&str>) -> String {
    let mut html = match align {
        Some(align) => format!("<figure class=\"align-{}\">\n", align.as_str()),
        None => "<figure>\n".to_owned(),
    };
    html.push_str(body);
    if let Some(caption) = caption {
        html.push_str(&format!("<figcaption>{}</figcaption>\n", escape_html(caption)));
    }
    html.push_str("</figure>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::Dimension;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"a < b && c > "d" 'e'"#),
            "a &lt; b &amp;&amp; c &gt; &quot;d&quot; &#x27;e&#x27;"
        );
    }

    #[test]
    fn test_png_tag_plain() {
        assert_eq!(
            png_tag("_images/render-ab.png", "cube(\"x\");", None),
            "<img src=\"_images/render-ab.png\" alt=\"cube(&quot;x&quot;);\" />\n"
        );
    }

    #[test]
    fn test_png_tag_sized() {
        let size = DisplaySize {
            width: Dimension::px(320),
            height: Dimension::px(240),
        };
        assert_eq!(
            png_tag("a.png", "Cube", Some(&size)),
            "<a href=\"a.png\"><img src=\"a.png\" alt=\"Cube\" width=\"320px\" height=\"240px\"/></a>\n"
        );
    }

    #[test]
    fn test_svg_style() {
        let svg = "<?xml version=\"1.0\"?>\n<svg width=\"10mm\"\n style=\"width:10mm;height:8mm\" xmlns=\"http://www.w3.org/2000/svg\">\n<path/></svg>";
        assert_eq!(svg_style(svg), Some("width:10mm;height:8mm"));
    }

    #[test]
    fn test_svg_style_missing() {
        assert_eq!(svg_style("<svg width=\"10\"><g style=\"x\"/></svg>"), None);
        assert_eq!(svg_style("not svg"), None);
    }

    #[test]
    fn test_svg_tag_wraps_fallback() {
        let html = svg_tag("a.svg", None, "<img src=\"a.png\" alt=\"\" />\n");
        assert_eq!(
            html,
            "<object data=\"a.svg\" type=\"image/svg+xml\" style=\"\">\n<img src=\"a.png\" alt=\"\" />\n</object>"
        );
    }

    #[test]
    fn test_figure_with_caption() {
        let html = figure("<p class=\"openscad\">x</p>\n", Some(Align::Center), Some("A & B"));
        assert_eq!(
            html,
            "<figure class=\"align-center\">\n<p class=\"openscad\">x</p>\n<figcaption>A &amp; B</figcaption>\n</figure>\n"
        );
    }
}
