//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Bare `$NAME` is left alone, so OpenSCAD special variables such as `$fn`
//! and shell positionals in `sh -c` templates pass through.

use std::sync::LazyLock;

use regex::Regex;
use scadoc_render::ToolCommand;

use crate::ConfigError;

static ENV_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").unwrap());

/// Expand environment variable references in a string.
///
/// `field` names the setting in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(value.len());
    let mut last = 0;
    for reference in ENV_REF_RE.find_iter(value) {
        expanded.push_str(&value[last..reference.start()]);
        expanded.push_str(&expand_reference(reference.as_str(), field)?);
        last = reference.end();
    }
    expanded.push_str(&value[last..]);
    Ok(expanded)
}

/// Expand a single `${VAR}` or `${VAR:-default}` reference.
fn expand_reference(reference: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env_with_context(reference, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand every string of a command template.
///
/// Expansion happens before tokenization, so a value containing spaces
/// splits into several arguments unless it is quoted in the template.
pub(crate) fn expand_command(command: &ToolCommand, field: &str) -> Result<ToolCommand, ConfigError> {
    match command {
        ToolCommand::Line(line) => Ok(ToolCommand::Line(expand_env(line, field)?)),
        ToolCommand::Args(args) => args
            .iter()
            .map(|arg| expand_env(arg, field))
            .collect::<Result<Vec<_>, _>>()
            .map(ToolCommand::Args),
    }
}

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}
