//! cityio-gfa - Gross floor area aggregator for CityIO grids
//!
//! A CLI tool that fetches one CityIO grid snapshot, sums the floor area
//! of its cells per category and prints the totals next to their targets
//! as a flat JSON object keyed by the grid's content hash.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (network, malformed grid, config, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod fetch;
mod grid;
mod models;
mod report;
mod rules;

use anyhow::{bail, Context, Result};
use cli::Args;
use config::Config;
use fetch::{FetchOptions, FetchedGrid, GridFetcher};
use grid::{GridHeader, GridLayout};
use rules::{RuleTable, TypeDefs};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("cityio-gfa v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Aggregation failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .cityio-gfa.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    eprintln!(
        "Created {} with default settings.",
        config::DEFAULT_CONFIG_FILE
    );
    Ok(())
}

/// Initialize logging based on verbosity settings. Logs go to stderr so
/// stdout carries only the summary.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fetch, aggregate and emit one grid snapshot.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if config.source.cityio && args.local.is_some() {
        bail!("--local cannot be combined with CityIO table mode");
    }

    if let Some(ref post_url) = config.output.post_url {
        check_post_url(post_url, &config.source, args.local.is_some())?;
    }

    let fetcher = GridFetcher::new(FetchOptions {
        timeout_seconds: config.source.timeout_seconds,
        token: config.resolve_token()?,
        show_progress: !args.quiet,
    })?;

    let mut layout = GridLayout::from(&config.grid);
    let (fetched, rules) = if config.source.cityio {
        let table = fetcher.fetch_cityio(&config.source.endpoint).await?;
        let header: GridHeader = serde_json::from_value(table.header)
            .map_err(|e| error::GfaError::MalformedGrid(format!("invalid header: {}", e)))?;
        let typedefs = TypeDefs::load(Path::new(&config.rules.typedefs))?;

        layout = layout.for_cityio(&header);
        let rules = rules::derive_rules(&header, &typedefs)?;
        (table.grid, rules)
    } else {
        let fetched = match args.local {
            Some(ref path) => read_local(path)?,
            None => fetcher.fetch_grid(&config.source.endpoint).await?,
        };
        (fetched, RuleTable::from_config(&config.rules)?)
    };

    info!(
        "Loaded grid from {} at {}",
        fetched.source,
        fetched.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if rules.is_empty() {
        warn!("Rule table is empty; every total will be zero");
    } else {
        debug!("Using {} type rules", rules.len());
    }

    let grid = grid::parse_grid(&fetched.document, &layout)?;
    debug!(
        "Grid is {}x{} ({} cells)",
        grid.height(),
        grid.width(),
        grid.cell_count()
    );
    let summary = analysis::compute_totals(&grid, &rules, &config.expected);

    info!(
        "Aggregated {} cells ({} mapped, {} unmapped, {} empty), total GFA {}",
        summary.stats.total_cells(),
        summary.stats.mapped_cells,
        summary.stats.unmapped_cells,
        summary.stats.empty_cells,
        summary.totals.sum()
    );
    if summary.stats.unmapped_cells > 0 {
        warn!(
            "{} cells have no matching rule and were skipped",
            summary.stats.unmapped_cells
        );
    }

    let output = report::generate_json_report(&summary, config.output.pretty)?;
    println!("{}", output);

    if !args.quiet {
        eprint!("{}", report::generate_comparison_table(&summary));
    }

    if let Some(ref file) = config.output.file {
        let path = PathBuf::from(file);
        report::write_report(&output, &path)?;
        info!("Summary saved to {}", path.display());
    }

    if let Some(ref post_url) = config.output.post_url {
        fetcher.post_json(post_url, &summary).await?;
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Read a grid document from a local file.
fn read_local(path: &Path) -> Result<FetchedGrid> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grid file: {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        error::GfaError::Parse(format!("{} is not JSON: {}", path.display(), e))
    })?;

    Ok(FetchedGrid {
        source: path.display().to_string(),
        document,
        fetched_at: chrono::Utc::now(),
    })
}

/// URLs the grid is read from for a given source.
fn source_urls(source: &config::SourceConfig) -> Vec<String> {
    if source.cityio {
        let base = source.endpoint.trim_end_matches('/');
        vec![
            base.to_string(),
            format!("{}/header", base),
            format!("{}/grid", base),
        ]
    } else {
        vec![source.endpoint.clone()]
    }
}

/// The summary sink must be an HTTP URL and must not be one of the URLs
/// the grid is read from.
fn check_post_url(post_url: &str, source: &config::SourceConfig, local: bool) -> Result<()> {
    if !cli::is_http_url(post_url) {
        bail!("Post URL must start with 'http://' or 'https://': {}", post_url);
    }
    if !local && source_urls(source).iter().any(|url| same_endpoint(post_url, url)) {
        bail!("Refusing to post the summary back to the grid endpoint {}", post_url);
    }
    Ok(())
}

/// Compare two URLs ignoring trailing slashes and case.
fn same_endpoint(a: &str, b: &str) -> bool {
    let normalize = |u: &str| u.trim().trim_end_matches('/').to_lowercase();
    normalize(a) == normalize(b) && cli::is_http_url(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_endpoint() {
        assert!(same_endpoint(
            "https://cityio.media.mit.edu/api/table/x/grid/",
            "https://CityIO.media.mit.edu/api/table/x/grid"
        ));
        assert!(!same_endpoint(
            "https://cityio.media.mit.edu/api/table/x/gfa",
            "https://cityio.media.mit.edu/api/table/x/grid"
        ));
        assert!(same_endpoint("HTTPS://x.org/grid", "https://x.org/grid"));
    }

    fn cityio_source() -> config::SourceConfig {
        config::SourceConfig {
            endpoint: "https://cityio.media.mit.edu/api/table/grasbrook/".to_string(),
            cityio: true,
            ..config::SourceConfig::default()
        }
    }

    #[test]
    fn test_source_urls_in_cityio_mode() {
        assert_eq!(
            source_urls(&cityio_source()),
            vec![
                "https://cityio.media.mit.edu/api/table/grasbrook",
                "https://cityio.media.mit.edu/api/table/grasbrook/header",
                "https://cityio.media.mit.edu/api/table/grasbrook/grid",
            ]
        );
    }

    #[test]
    fn test_post_url_refused_for_fetched_urls() {
        let source = cityio_source();
        for url in [
            "https://cityio.media.mit.edu/api/table/grasbrook/grid",
            "HTTPS://cityio.media.mit.edu/api/table/grasbrook/header/",
            "https://cityio.media.mit.edu/api/table/grasbrook",
        ] {
            assert!(check_post_url(url, &source, false).is_err(), "{}", url);
        }

        assert!(check_post_url(
            "https://cityio.media.mit.edu/api/table/grasbrook/gfa",
            &source,
            false
        )
        .is_ok());
    }

    #[test]
    fn test_post_url_must_be_http() {
        let source = config::SourceConfig::default();
        assert!(check_post_url("ftp://example.org/gfa", &source, false).is_err());
        assert!(check_post_url("ftp://example.org/gfa", &source, true).is_err());
        assert!(check_post_url(&source.endpoint.to_uppercase(), &source, false).is_err());
        assert!(check_post_url(&source.endpoint, &source, true).is_ok());
    }

    #[test]
    fn test_read_local_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(&path, r#"[[{"type": "commercial"}]]"#).unwrap();

        let fetched = read_local(&path).unwrap();
        let grid = grid::parse_grid(&fetched.document, &GridLayout::default()).unwrap();
        let summary = analysis::compute_totals(
            &grid,
            &RuleTable::builtin(),
            &models::ExpectedTargets::default(),
        );

        let json = report::generate_json_report(&summary, false).unwrap();
        assert!(json.contains(r#""commerce":1888768"#));
        assert!(json.contains(r#""commerce_expected":550000"#));
    }

    #[test]
    fn test_read_local_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(&path, "not json").unwrap();

        let err = read_local(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<error::GfaError>(),
            Some(error::GfaError::Parse(_))
        ));
    }
}
