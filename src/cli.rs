//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// cityio-gfa - Gross floor area totals for CityIO grids
///
/// Fetches one grid snapshot, sums floor area per category (living,
/// commerce, special, green, sports, playgrounds) and prints the totals
/// next to their targets as a flat JSON object.
///
/// Examples:
///   cityio-gfa
///   cityio-gfa --endpoint https://cityio.media.mit.edu/api/table/grasbrook/grid
///   cityio-gfa --cityio --endpoint https://cityio.media.mit.edu/api/table/grasbrook
///   cityio-gfa --local ./grid.json --pretty
///   cityio-gfa --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Grid endpoint to poll
    ///
    /// In --cityio mode this is the table base URL; `/header` and `/grid`
    /// are appended. Defaults to the endpoint in .cityio-gfa.toml.
    #[arg(short, long, value_name = "URL", conflicts_with = "local")]
    pub endpoint: Option<String>,

    /// Read the grid document from a local JSON file instead of the endpoint
    #[arg(short, long, value_name = "FILE")]
    pub local: Option<PathBuf>,

    /// Treat the endpoint as a CityIO table and derive rules from its header
    #[arg(long, conflicts_with = "local")]
    pub cityio: bool,

    /// Typedefs JSON used to map CityIO uses to categories
    #[arg(long, value_name = "FILE")]
    pub typedefs: Option<PathBuf>,

    /// Column count used to reshape a flat cell list
    #[arg(long, value_name = "COUNT")]
    pub ncols: Option<usize>,

    /// Bearer token for the endpoint
    #[arg(long, env = "CITYIO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cityio-gfa.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write the summary to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// POST the summary as JSON to this URL
    ///
    /// Must differ from the grid endpoint.
    #[arg(long, value_name = "URL")]
    pub post_url: Option<String>,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pub pretty: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .cityio-gfa.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref endpoint) = self.endpoint {
            if !is_http_url(endpoint) {
                return Err("Endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref post_url) = self.post_url {
            if !is_http_url(post_url) {
                return Err("Post URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.ncols == Some(0) {
            return Err("Column count must be at least 1".to_string());
        }

        if let Some(ref local_path) = self.local {
            if !local_path.is_file() {
                return Err(format!(
                    "Local grid file does not exist: {}",
                    local_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// True when `url` has an `http` or `https` scheme, in any case.
pub(crate) fn is_http_url(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            endpoint: None,
            local: None,
            cityio: false,
            typedefs: None,
            ncols: None,
            token: None,
            timeout: None,
            config: None,
            output: None,
            post_url: None,
            pretty: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_endpoint() {
        let mut args = make_args();
        args.endpoint = Some("cityio.media.mit.edu/api".to_string());
        assert!(args.validate().is_err());

        args.endpoint = Some("https://cityio.media.mit.edu/api/table/x/grid".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_is_http_url_ignores_scheme_case() {
        assert!(is_http_url("HTTPS://cityio.media.mit.edu/api"));
        assert!(is_http_url("Http://localhost:8080/grid"));
        assert!(!is_http_url("ftp://cityio.media.mit.edu/api"));
        assert!(!is_http_url("cityio.media.mit.edu"));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_local_file() {
        let mut args = make_args();
        args.local = Some(PathBuf::from("/nonexistent/grid.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.ncols = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_endpoint_flag() {
        let args = Args::try_parse_from([
            "cityio-gfa",
            "--endpoint",
            "https://example.org/grid",
            "--pretty",
        ])
        .unwrap();
        assert_eq!(args.endpoint.as_deref(), Some("https://example.org/grid"));
        assert!(args.pretty);
        assert!(!args.cityio);
    }

    #[test]
    fn test_local_conflicts_with_endpoint() {
        let result = Args::try_parse_from([
            "cityio-gfa",
            "--endpoint",
            "https://example.org/grid",
            "--local",
            "grid.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
