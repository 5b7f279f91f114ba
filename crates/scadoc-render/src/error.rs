//! Error types for OpenSCAD rendering.

use std::io;

/// Error raised while rendering a single OpenSCAD node.
///
/// Every variant except [`Io`](Self::Io) is recoverable: the node that
/// triggered it is dropped from the output and the build continues with a
/// warning. `Io` covers unexpected operating system failures and is propagated
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Requested output format is not in the dispatch table.
    #[error("{setting} must be one of {valid}, but is '{value}'")]
    UnsupportedFormat {
        /// Setting that carried the value (e.g., `openscad.html_format`).
        setting: &'static str,
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted values.
        valid: &'static str,
    },

    /// Command template cannot be turned into an argument list.
    #[error("{tool} command {command:?} is invalid: {reason}")]
    InvalidCommand {
        /// Tool name (e.g., "openscad").
        tool: &'static str,
        /// The configured command template.
        command: String,
        /// Why tokenization failed.
        reason: &'static str,
    },

    /// External executable was not found on the search path.
    #[error("{tool} command {command:?} cannot be run")]
    ToolMissing {
        /// Tool name (e.g., "epstopdf").
        tool: &'static str,
        /// The configured command template.
        command: String,
    },

    /// External executable ran and failed.
    #[error("error while running {tool}\n\n{message}")]
    ToolError {
        /// Tool name.
        tool: &'static str,
        /// Captured standard error, or a description of the missing output.
        message: String,
    },

    /// User input is unusable (unreadable source file, malformed option).
    #[error("{0}")]
    Input(String),

    /// Unexpected operating system failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RenderError {
    /// Whether the error should be reported as a warning and the node skipped.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
