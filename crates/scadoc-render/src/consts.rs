//! Internal constants for OpenSCAD rendering.

/// Prefix shared by every cached artifact file name.
pub const FILE_PREFIX: &str = "render-";

/// Extension of the model source file written next to the artifacts.
///
/// OpenSCAD picks its input parser from the extension, so this must stay `scad`.
pub const SOURCE_EXTENSION: &str = "scad";

/// Prefix of per-render staging directories inside the output directory.
pub const STAGING_PREFIX: &str = ".render-";

/// Flag that precedes the output path on the renderer command line.
pub const OUTPUT_FLAG: &str = "-o";

/// Interpreter used to run a post-processor that is not directly executable.
pub const FALLBACK_SHELL: &str = "sh";

/// Script handed to [`FALLBACK_SHELL`] with the program as `$0`.
///
/// `exec` searches `PATH` and runs a shebang-less file as a shell script;
/// `sh <program>` would open `program` relative to the working directory.
pub const FALLBACK_SCRIPT: &str = r#"exec "$0" "$@""#;

/// Placeholder prefix for extracted code blocks.
///
/// Markdown input cannot produce NUL: the parser turns it into U+FFFD.
pub const PLACEHOLDER_PREFIX: &str = "\u{0}OPENSCAD_";

/// Placeholder terminator for extracted code blocks.
pub const PLACEHOLDER_SUFFIX: &str = "\u{0}";

/// Default scale percentage.
pub const FULL_SCALE: u32 = 100;
