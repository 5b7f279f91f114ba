//! Display size computation for raster previews.
//!
//! Width and height options are `<integer><optional unit>` strings; the unit
//! defaults to `px`. Either axis falls back to the native PNG size, and the
//! scale percentage applies to both.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::consts::FULL_SCALE;
use crate::error::RenderError;

/// Integer value with an optional alphabetic unit, e.g. `200px`, `12 em`, `100`.
static DIMENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([a-zA-Z]+)?$").unwrap());

/// Percentage with an optional trailing `%`, e.g. `50`, `50%`, `50 %`.
static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s*%?$").unwrap());

/// Length with a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Numeric value.
    pub value: u64,
    /// CSS unit (e.g., "px", "em").
    pub unit: String,
}

impl Dimension {
    /// Dimension in pixels.
    #[must_use]
    pub fn px(value: u64) -> Self {
        Self {
            value,
            unit: "px".to_owned(),
        }
    }

    /// Apply a percentage to the value.
    ///
    /// Fails when the scaled value does not fit in a `u64`.
    pub fn scaled(&self, scale: u32) -> Result<Self, RenderError> {
        let value = self
            .value
            .checked_mul(u64::from(scale))
            .ok_or_else(|| {
                RenderError::Input(format!("{self} scaled by {scale}% is out of range"))
            })?;
        Ok(Self {
            value: value / u64::from(FULL_SCALE),
            unit: self.unit.clone(),
        })
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Parse a width or height option.
///
/// `axis` names the option in the error message.
pub fn parse_dimension(axis: &str, value: &str) -> Result<Dimension, RenderError> {
    let invalid = || {
        RenderError::Input(format!(
            "invalid {axis} '{value}': expected an integer with an optional unit"
        ))
    };
    let caps = DIMENSION_RE.captures(value.trim()).ok_or_else(invalid)?;
    let number = caps[1].parse::<u64>().map_err(|_| invalid())?;
    let unit = caps.get(2).map_or("px", |m| m.as_str());
    Ok(Dimension {
        value: number,
        unit: unit.to_owned(),
    })
}

/// Parse a scale option given as a percentage.
pub fn parse_scale(value: &str) -> Result<u32, RenderError> {
    SCALE_RE
        .captures(value.trim())
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .ok_or_else(|| {
            RenderError::Input(format!(
                "invalid scale '{value}': expected a non-negative integer percentage"
            ))
        })
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Final `width`/`height` attribute values for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySize {
    /// Rendered width.
    pub width: Dimension,
    /// Rendered height.
    pub height: Dimension,
}

/// Compute display dimensions from the native size and the sizing options.
///
/// A missing axis uses its native pixel size; a missing scale is 100.
///
/// # Example
///
/// ```ignore
/// let native = ImageSize { width: 640, height: 480 };
/// let size = display_size(native, None, None, Some(50))?;
/// assert_eq!(size.width.to_string(), "320px");
/// ```
pub fn display_size(
    native: ImageSize,
    width: Option<&str>,
    height: Option<&str>,
    scale: Option<u32>,
) -> Result<DisplaySize, RenderError> {
    let width = match width {
        Some(w) => parse_dimension("width", w)?,
        None => Dimension::px(u64::from(native.width)),
    };
    let height = match height {
        Some(h) => parse_dimension("height", h)?,
        None => Dimension::px(u64::from(native.height)),
    };
    let scale = scale.unwrap_or(FULL_SCALE);
    Ok(DisplaySize {
        width: width.scaled(scale)?,
        height: height.scaled(scale)?,
    })
}

/// Read the pixel size from a PNG header.
///
/// Returns `None` when the data is not a PNG.
#[must_use]
pub fn png_dimensions(data: &[u8]) -> Option<ImageSize> {
    if data.len() < 24 {
        return None;
    }

    // PNG signature check
    if &data[0..8] != b"\x89PNG\r\n\x1a\n" {
        return None;
    }

    // IHDR chunk: width at bytes 16-20, height at bytes 20-24 (big-endian)
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some(ImageSize { width, height })
}

/// Read the pixel size of a rendered PNG file.
pub(crate) fn read_png_size(path: &Path) -> Result<ImageSize, RenderError> {
    let data = std::fs::read(path)?;
    png_dimensions(&data).ok_or_else(|| RenderError::ToolError {
        tool: crate::command::RENDERER,
        message: format!("{} is not a PNG image", path.display()),
    })
}
