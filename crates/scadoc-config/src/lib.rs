//! Configuration management for scadoc.
//!
//! Parses `scadoc.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ```toml
//! [docs]
//! source_dir = "docs"
//! output_dir = ".scadoc/build"
//!
//! [openscad]
//! command = "openscad --imgsize=800,600"
//! epstopdf = ["sh", "/usr/bin/epstopdf"]
//! html_format = "svg"
//! print_format = "pdf"
//! images_dir = "_images"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Command templates support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `openscad.command`
//! - `openscad.epstopdf`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use scadoc_render::ToolCommand;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override docs source directory.
    pub source_dir: Option<PathBuf>,
    /// Override build output directory.
    pub output_dir: Option<PathBuf>,
    /// Override the renderer command line.
    pub command: Option<String>,
    /// Override the HTML output format.
    pub html_format: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "scadoc.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Renderer configuration.
    pub openscad: OpenScadConfig,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
}

/// Resolved documentation configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Source directory for markdown files.
    pub source_dir: PathBuf,
    /// Directory receiving rendered HTML pages.
    pub output_dir: PathBuf,
}

/// Renderer configuration.
///
/// Formats stay strings here; they are checked when a model is rendered so
/// that a bad value is reported per model.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OpenScadConfig {
    /// Renderer command template (string or list).
    pub command: ToolCommand,
    /// EPS to PDF converter command template (string or list).
    pub epstopdf: ToolCommand,
    /// HTML output format: `png` or `svg`.
    pub html_format: String,
    /// Print output format: `eps`, `pdf` or `png`.
    pub print_format: String,
    /// Artifact directory, relative to the output directory.
    pub images_dir: String,
}

impl Default for OpenScadConfig {
    fn default() -> Self {
        Self {
            command: ToolCommand::from("openscad"),
            epstopdf: ToolCommand::from("epstopdf"),
            html_format: "png".to_owned(),
            print_format: "png".to_owned(),
            images_dir: "_images".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`openscad.command`").
        field: String,
        /// Error message (e.g., "${`OPENSCAD_BIN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a command template to name a program.
fn require_command(command: &ToolCommand, field: &str) -> Result<(), ConfigError> {
    match command {
        ToolCommand::Line(line) => require_non_empty(line, field),
        ToolCommand::Args(args) => match args.first() {
            Some(program) => require_non_empty(program, field),
            None => Err(ConfigError::Validation(format!("{field} cannot be empty"))),
        },
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `scadoc.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Directory holding rendered artifacts.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.docs_resolved.output_dir.join(&self.openscad.images_dir)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.docs_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(command) = &settings.command {
            self.openscad.command = ToolCommand::Line(command.clone());
        }
        if let Some(html_format) = &settings.html_format {
            self.openscad.html_format.clone_from(html_format);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            docs: DocsConfigRaw::default(),
            openscad: OpenScadConfig::default(),
            docs_resolved: DocsConfig {
                source_dir: base.join("docs"),
                output_dir: base.join(".scadoc/build"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after applying CLI
    /// settings. Output formats are not checked here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_command(&self.openscad.command, "openscad.command")?;
        require_command(&self.openscad.epstopdf, "openscad.epstopdf")?;
        require_non_empty(&self.openscad.images_dir, "openscad.images_dir")?;
        if Path::new(&self.openscad.images_dir).is_absolute() {
            return Err(ConfigError::Validation(
                "openscad.images_dir must be relative to the output directory".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.openscad.command = expand::expand_command(&self.openscad.command, "openscad.command")?;
        self.openscad.epstopdf =
            expand::expand_command(&self.openscad.epstopdf, "openscad.epstopdf")?;
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.docs_resolved = DocsConfig {
            source_dir: resolve(self.docs.source_dir.as_deref(), "docs"),
            output_dir: resolve(self.docs.output_dir.as_deref(), ".scadoc/build"),
        };
    }
}
