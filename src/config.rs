//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cityio-gfa.toml` files.

use crate::models::ExpectedTargets;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".cityio-gfa.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Grid source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Grid layout settings.
    #[serde(default)]
    pub grid: GridConfig,

    /// Cell type rules.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Per-category targets.
    #[serde(default)]
    pub expected: ExpectedTargets,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the grid comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Grid endpoint, or CityIO table base URL in CityIO mode.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Bearer token for the endpoint.
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the bearer token on its first line.
    #[serde(default = "default_token_file")]
    pub token_file: String,

    /// Treat the endpoint as a CityIO table and derive rules from its header.
    #[serde(default)]
    pub cityio: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout(),
            token: None,
            token_file: default_token_file(),
            cityio: false,
        }
    }
}

fn default_endpoint() -> String {
    "https://cityio.media.mit.edu/api/table/grasbrook/grid".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_token_file() -> String {
    "token.txt".to_string()
}

/// How cells are read from the grid document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cell field holding the type code.
    #[serde(default = "default_type_key")]
    pub type_key: String,

    /// Cell field holding the unit count.
    #[serde(default = "default_units_key")]
    pub units_key: String,

    /// Column count for flat cell lists.
    #[serde(default)]
    pub ncols: Option<usize>,

    /// Expected row count.
    #[serde(default)]
    pub nrows: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            type_key: default_type_key(),
            units_key: default_units_key(),
            ncols: None,
            nrows: None,
        }
    }
}

fn default_type_key() -> String {
    "type".to_string()
}

fn default_units_key() -> String {
    "height".to_string()
}

/// Rule table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Explicit rules. Empty means the built-in table.
    #[serde(default)]
    pub types: Vec<RuleEntry>,

    /// Typedefs file used in CityIO mode.
    #[serde(default = "default_typedefs")]
    pub typedefs: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            typedefs: default_typedefs(),
        }
    }
}

fn default_typedefs() -> String {
    "typedefs.json".to_string()
}

/// One `[[rules.types]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Type code as it appears in the grid.
    pub code: String,
    /// Category name.
    pub category: String,
    /// Area per unit.
    pub multiplier: u64,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print the summary.
    #[serde(default)]
    pub pretty: bool,

    /// Also write the summary to this file.
    #[serde(default)]
    pub file: Option<String>,

    /// POST the summary to this URL.
    #[serde(default)]
    pub post_url: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings
    /// when they are explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.source.endpoint = endpoint.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(ref token) = args.token {
            self.source.token = Some(token.clone());
        }
        if args.cityio {
            self.source.cityio = true;
        }

        if let Some(ncols) = args.ncols {
            self.grid.ncols = Some(ncols);
        }
        if let Some(ref typedefs) = args.typedefs {
            self.rules.typedefs = typedefs.display().to_string();
        }

        if args.pretty {
            self.output.pretty = true;
        }
        if let Some(ref output) = args.output {
            self.output.file = Some(output.display().to_string());
        }
        if let Some(ref post_url) = args.post_url {
            self.output.post_url = Some(post_url.clone());
        }
    }

    /// Resolve the bearer token: explicit value first, then the token file.
    ///
    /// A missing or empty token file means no token.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = self.source.token.as_deref().map(str::trim) {
            if !token.is_empty() {
                return Ok(Some(token.to_string()));
            }
        }

        let path = Path::new(&self.source.token_file);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let token = content.lines().next().unwrap_or("").trim();

        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
