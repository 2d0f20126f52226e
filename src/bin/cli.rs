//! Listing monitor CLI
//!
//! Local execution entry point, meant to be triggered by cron or a CI
//! schedule. One invocation of `run` is one monitoring pass.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use listing_monitor::{
    error::{AppError, Result},
    models::{Config, DiffMode, GENERIC_STRATEGY, Source},
    pipeline::{Monitor, SanityGuard},
    services::{
        ExtractionStrategy, ExtractorRegistry, HttpFetcher, Normalizer, fetch_with_retry,
    },
    storage::{LocalStorage, StateStore},
    utils::log::{header, separator, sub_item},
};

/// Housing listing change monitor
#[derive(Parser, Debug)]
#[command(
    name = "monitor",
    version,
    about = "Watches listing pages and pushes alerts when listings change"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/monitor.toml")]
    config: PathBuf,

    /// Override the state directory from the configuration
    #[arg(short, long)]
    state_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every configured source once
    Run {
        /// Only check this configured source URL
        #[arg(long)]
        source: Option<String>,
    },

    /// Validate the configuration and compile all strategies
    Validate,

    /// Show stored state per source
    Info,

    /// Fetch, normalize and extract one page without touching state
    Probe {
        #[arg(long)]
        url: String,
    },
}

/// Initialize logging. `RUST_LOG` wins, then the verbosity flag, then the
/// configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// `DEBUG=true` turns on verbose output, as the scheduled workflows set it.
fn debug_from_env() -> bool {
    std::env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Load configuration and apply CLI/environment overrides.
///
/// Outside `validate`, an unreadable file falls back to defaults; the load
/// error is handed back so it can be logged once logging is up.
fn load_config(cli: &Cli) -> Result<(Config, Option<AppError>)> {
    let (mut config, load_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) if matches!(cli.command, Command::Validate) => return Err(e),
        Err(e) => (Config::default(), Some(e)),
    };

    if let Ok(topic) = std::env::var("NTFY_TOPIC_URL") {
        let topic = topic.trim();
        if !topic.is_empty() {
            config.notify.endpoint = Some(topic.to_string());
        }
    }
    if let Some(dir) = &cli.state_dir {
        config.storage.dir = dir.clone();
    }
    Ok((config, load_error))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, load_error) = load_config(&cli)?;
    init_logging(cli.verbose || debug_from_env(), &config.logging.level);

    match load_error {
        Some(e) => log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        ),
        None => log::info!("Loaded configuration from {}", cli.config.display()),
    }

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    let config = Arc::new(config);

    match &cli.command {
        Command::Run { source } => run(config, source.as_deref()).await?,
        Command::Validate => validate(&config)?,
        Command::Info => info(&config).await?,
        Command::Probe { url } => probe(&config, url).await?,
    }

    Ok(())
}

async fn run(config: Arc<Config>, only: Option<&str>) -> Result<()> {
    let monitor = Monitor::from_config(Arc::clone(&config))?;

    let report = match only {
        Some(url) => {
            let source = config
                .source(url)
                .cloned()
                .ok_or_else(|| AppError::config(format!("Source {url} is not configured")))?;
            monitor.run_sources(&[source], Utc::now()).await?
        }
        None => monitor.run_once().await?,
    };

    if report.notify_failures() > 0 {
        log::warn!(
            "{} notification(s) could not be delivered; see errors above",
            report.notify_failures()
        );
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    log::info!("Validating configuration...");

    let registry = ExtractorRegistry::from_config(config)?;
    log::info!(
        "✓ Config OK ({} sources, {} strategies)",
        config.sources.len(),
        config.strategies.len()
    );
    for source in &config.sources {
        let strategy = registry
            .strategy_for(&source.url)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| GENERIC_STRATEGY.to_string());
        sub_item(&format!("{} [{:?}, {}]", source.url, source.mode, strategy));
    }

    log::info!("All validations passed!");
    Ok(())
}

async fn info(config: &Config) -> Result<()> {
    let store = LocalStorage::new(&config.storage.dir);
    let state = store.load_state().await?;

    header(&format!("State in {}", store.root_dir().display()));
    for source in &config.sources {
        log::info!("{}", source.url);
        match state.baselines.get(&source.url) {
            Some(baseline) => {
                let size = match baseline.mode {
                    DiffMode::Identifiers => format!("{} identifiers", baseline.identifiers.len()),
                    DiffMode::Text => format!(
                        "{} chars of text",
                        state.texts.get(&source.url).map_or(0, |t| t.len())
                    ),
                };
                sub_item(&format!("Baseline: {} (updated {})", size, baseline.updated_at));
            }
            None => sub_item("Baseline: none yet"),
        }
        if let Some(failure) = state.failures.get(&source.url).filter(|f| f.count > 0) {
            sub_item(&format!(
                "Failures: {} in a row (last: {})",
                failure.count,
                failure.last_error.as_deref().unwrap_or("unknown")
            ));
        }
        if let Some(cooldown) = state.cooldowns.get(&source.url) {
            if let Some(at) = cooldown.content_change {
                sub_item(&format!("Last change alert: {at}"));
            }
            if let Some(at) = cooldown.unreachable {
                sub_item(&format!("Last outage alert: {at}"));
            }
        }
        separator();
    }
    Ok(())
}

async fn probe(config: &Config, url: &str) -> Result<()> {
    let source = config
        .source(url)
        .cloned()
        .unwrap_or_else(|| Source::new(url));

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let raw = fetch_with_retry(&fetcher, &source, &config.fetch).await?;
    let text = Normalizer::new(config.normalize.clone()).normalize(&raw, &source);
    log::info!(
        "Fetched {} chars, {} after normalization",
        raw.len(),
        text.len()
    );
    log::debug!("Normalized text:\n{}", text);

    let registry = ExtractorRegistry::from_config(config)?;
    let extraction = registry.extract(&text, &source);
    let sanity = SanityGuard::new(config.sanity.clone()).check(
        &source,
        &extraction.identifiers,
        &text,
        None,
    );

    header(&format!(
        "{} identifier(s) via '{}'{}",
        extraction.identifiers.len(),
        extraction.strategy,
        if extraction.used_fallback { " (fallback)" } else { "" }
    ));
    for id in &extraction.identifiers {
        sub_item(id);
    }
    if sanity.is_anomaly() {
        log::warn!("Sanity check would reject this result: {:?}", sanity);
    }
    Ok(())
}
