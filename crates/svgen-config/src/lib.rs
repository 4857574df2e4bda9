//! Configuration management for svgen.
//!
//! Parses `svgen.toml` with serde and searches the current directory and
//! its parents when no explicit path is given. Every field has a default,
//! so running without a config file is valid.
//!
//! CLI settings are applied after loading via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `mermaid.url`
//! - `graphviz.url`
//! - `latex.url`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use svgen_diagrams::consts::{
    DEFAULT_DPI, DEFAULT_GRAPHVIZ_LAYOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_MERMAID_THEME,
    DEFAULT_TIMEOUT,
};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "svgen.toml";

/// Upper bound accepted for `latex.dpi`.
const MAX_DPI: u32 = 1000;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the Mermaid rendering service URL.
    pub mermaid_url: Option<String>,
    /// Override the Graphviz rendering service URL.
    pub graphviz_url: Option<String>,
    /// Override the LaTeX rendering service URL.
    pub latex_url: Option<String>,
    /// Override the LaTeX rendering resolution.
    pub dpi: Option<u32>,
    /// Override the per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mermaid flowchart service.
    pub mermaid: MermaidConfig,
    /// Graphviz service.
    pub graphviz: GraphvizConfig,
    /// LaTeX math service.
    pub latex: LatexConfig,
    /// HTTP client behaviour shared by all services.
    pub http: HttpConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Mermaid service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MermaidConfig {
    /// Service root, e.g. `https://mermaid.ink`.
    pub url: String,
    /// Theme name sent in the encoded payload.
    pub theme: String,
}

impl Default for MermaidConfig {
    fn default() -> Self {
        Self {
            url: "https://mermaid.ink".to_owned(),
            theme: DEFAULT_MERMAID_THEME.to_owned(),
        }
    }
}

/// Graphviz service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphvizConfig {
    /// Service root; requests go to `{url}/graphviz`.
    pub url: String,
    /// Layout engine name.
    pub layout: String,
}

impl Default for GraphvizConfig {
    fn default() -> Self {
        Self {
            url: "https://quickchart.io".to_owned(),
            layout: DEFAULT_GRAPHVIZ_LAYOUT.to_owned(),
        }
    }
}

/// LaTeX service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LatexConfig {
    /// Service root; requests go to `{url}/svg.image?...`.
    pub url: String,
    /// Rendering resolution passed as `\dpi{N}`.
    pub dpi: u32,
}

impl Default for LatexConfig {
    fn default() -> Self {
        Self {
            url: "https://latex.codecogs.com".to_owned(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum redirect hops followed for a single request.
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl HttpConfig {
    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
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
        /// Config field path (e.g., "`latex.url`").
        field: String,
        /// Error message (e.g., "${`LATEX_URL`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `svgen.toml` in the current directory and its parents, falling
    /// back to defaults when none is found.
    ///
    /// CLI settings are applied last and the result is validated again.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the final configuration is invalid.
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
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(url) = &settings.mermaid_url {
            self.mermaid.url.clone_from(url);
        }
        if let Some(url) = &settings.graphviz_url {
            self.graphviz.url.clone_from(url);
        }
        if let Some(url) = &settings.latex_url {
            self.latex.url.clone_from(url);
        }
        if let Some(dpi) = settings.dpi {
            self.latex.dpi = dpi;
        }
        if let Some(timeout_secs) = settings.timeout_secs {
            self.http.timeout_secs = timeout_secs;
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

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (url, field) in [
            (&self.mermaid.url, "mermaid.url"),
            (&self.graphviz.url, "graphviz.url"),
            (&self.latex.url, "latex.url"),
        ] {
            require_non_empty(url, field)?;
            require_http_url(url, field)?;
        }
        require_non_empty(&self.mermaid.theme, "mermaid.theme")?;
        require_non_empty(&self.graphviz.layout, "graphviz.layout")?;

        if self.latex.dpi == 0 {
            return Err(ConfigError::Validation(
                "latex.dpi must be greater than 0".to_owned(),
            ));
        }
        if self.latex.dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "latex.dpi cannot exceed {MAX_DPI}"
            )));
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.mermaid.url = expand::expand_env(&self.mermaid.url, "mermaid.url")?;
        self.graphviz.url = expand::expand_env(&self.graphviz.url, "graphviz.url")?;
        self.latex.url = expand::expand_env(&self.latex.url, "latex.url")?;
        Ok(())
    }
}
