//! Skill-Harvester main entry point
//!
//! This is the command-line interface for the vacancy skill harvester.

use clap::Parser;
use skill_harvester::api::{
    build_http_client, AccessTokenManager, RetryPolicy, RetryingFetcher, TokenConfig,
    VacancyClient,
};
use skill_harvester::cache::{CacheWriter, SqliteCache};
use skill_harvester::config::{load_config_with_hash, Config};
use skill_harvester::report::{
    load_latest_statistics, print_detail, print_statistics, profession_detail,
};
use skill_harvester::scraper::{OrchestratorSettings, ProfessionStatus, RunReport};
use skill_harvester::storage::{seed_professions, share, SharedStorage, SqliteStorage};
use skill_harvester::ScrapeOrchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How long the cache worker may keep draining after a run
const CACHE_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Skill-Harvester: vacancy skill statistics collector
///
/// Skill-Harvester queries a vacancy-search API for every configured
/// profession, counts the skills listed on and mentioned in each vacancy,
/// and records the counts per scraping session.
#[derive(Parser, Debug)]
#[command(name = "skill-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A vacancy skill statistics collector", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Harvest without writing statistics (cache only)
    #[arg(long, conflicts_with_all = ["stats", "show", "check_config"])]
    dry_run: bool,

    /// Show statistics of the latest session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "show", "check_config"])]
    stats: bool,

    /// Show one profession's latest statistics and exit
    #[arg(long, value_name = "PROFESSION_ID", conflicts_with_all = ["dry_run", "stats", "check_config"])]
    show: Option<i64>,

    /// Print --show output as JSON
    #[arg(long, requires = "show")]
    json: bool,

    /// Validate config and show what would be harvested
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "show"])]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.check_config {
        handle_check_config(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(profession_id) = cli.show {
        handle_show(&config, profession_id, cli.json).await?;
    } else {
        handle_run(config, config_hash, !cli.dry_run).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skill_harvester=info,warn"),
            1 => EnvFilter::new("skill_harvester=debug,info"),
            2 => EnvFilter::new("skill_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --check-config mode: validates config and shows what would be harvested
fn handle_check_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Skill-Harvester Configuration ===\n");

    println!("Upstream:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Token URL: {}", config.api.token_url);
    println!("  Client ID: {}", config.api.client_id);
    println!("  User agent: {}", config.api.user_agent);
    println!("  Area: {}", config.api.area);
    println!("  Page size: {}", config.api.page_size);
    println!(
        "  Pre-issued token: {}",
        if config.api.access_token.is_some() { "yes" } else { "no" }
    );

    println!("\nRate Limit:");
    println!("  Capacity: {}", config.rate_limit.capacity);
    println!("  Refill: {}/s", config.rate_limit.refill_per_second);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Delay: {}ms initial, {}ms max, x{}",
        config.retry.initial_delay_ms, config.retry.max_delay_ms, config.retry.multiplier
    );
    println!("  Total budget: {}ms", config.retry.max_total_time_ms);

    println!("\nScraper:");
    println!(
        "  Profession timeout: {:?}",
        config.scraper.profession_timeout()
    );
    println!("  Run timeout: {:?}", config.scraper.run_timeout());
    println!(
        "  Token refresh interval: {:?}",
        config.scraper.token_min_refresh()
    );
    println!("  Concurrency: {}", config.scraper.concurrency);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Cache expiry: {:?}", config.cache.expiry());

    let active = config.professions.iter().filter(|p| p.active).count();
    println!("\nProfessions ({} active):", active);
    for entry in &config.professions {
        let marker = if entry.active { "" } else { " [inactive]" };
        println!("  - {}{}: \"{}\"", entry.name, marker, entry.query);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} professions", active);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_latest_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No scraping sessions recorded yet"),
    }

    Ok(())
}

/// Handles the --show mode: prints one profession's detail through the cache
async fn handle_show(
    config: &Config,
    profession_id: i64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(&config.output.database_path);
    let storage: SharedStorage = share(SqliteStorage::new(path)?);
    let cache = Arc::new(SqliteCache::open(path)?);
    let (writer, worker) = CacheWriter::spawn(
        cache.clone(),
        config.cache.expiry(),
        config.cache.write_timeout(),
        config.cache.queue_capacity,
    );

    let result = profession_detail(&storage, cache.as_ref(), Some(&writer), profession_id).await;
    worker.shutdown(CACHE_SHUTDOWN_GRACE).await;

    let detail = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_detail(&detail);
    }

    Ok(())
}

/// Handles the main harvest run
async fn handle_run(
    config: Config,
    config_hash: String,
    persist: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(&config.output.database_path);

    let mut storage = SqliteStorage::new(path)?;
    seed_professions(&mut storage, &config.professions)?;
    let storage = share(storage);

    let http = build_http_client(&config.api.user_agent)?;
    let tokens = Arc::new(AccessTokenManager::new(
        http.clone(),
        TokenConfig {
            token_url: config.api.token_url.clone(),
            client_id: config.api.client_id.clone(),
            client_secret: config.api.client_secret.clone(),
            min_refresh_interval: config.scraper.token_min_refresh(),
            initial_token: config.api.access_token.clone(),
        },
    ));
    let fetcher = RetryingFetcher::new(
        http,
        tokens.clone(),
        &config.rate_limit,
        RetryPolicy::from_config(&config.retry),
        &config.api.user_agent,
    )?;
    let client = VacancyClient::new(fetcher, &config.api)?;

    let cache = Arc::new(SqliteCache::open(path)?);
    let (writer, worker) = CacheWriter::spawn(
        cache,
        config.cache.expiry(),
        config.cache.write_timeout(),
        config.cache.queue_capacity,
    );

    let orchestrator = ScrapeOrchestrator::new(
        Arc::new(client),
        storage,
        writer,
        OrchestratorSettings {
            profession_timeout: config.scraper.profession_timeout(),
            concurrency: config.scraper.concurrency as usize,
            config_hash,
        },
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal_or_timeout(
        cancel.clone(),
        config.scraper.run_timeout(),
    ));

    if persist {
        tracing::info!("Starting harvest run");
    } else {
        tracing::info!("Starting dry run (statistics will not be persisted)");
    }

    let result = orchestrator.run(&cancel, persist).await;
    watcher.abort();
    drop(orchestrator);
    worker.shutdown(CACHE_SHUTDOWN_GRACE).await;

    match result {
        Ok(report) => {
            tracing::info!(
                "Harvest finished ({} token requests)",
                tokens.refresh_count()
            );
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cancels the run on Ctrl-C or when the run timeout elapses
async fn cancel_on_signal_or_timeout(cancel: CancellationToken, run_timeout: Duration) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::warn!("Interrupt received, cancelling run"),
                Err(e) => {
                    tracing::error!("Failed to listen for interrupt: {}", e);
                    return;
                }
            }
        }
        _ = tokio::time::sleep(run_timeout) => {
            tracing::warn!("Run timeout of {:?} reached, cancelling run", run_timeout);
        }
    }
    cancel.cancel();
}

fn print_report(report: &RunReport) {
    println!("\n=== Harvest Report ===\n");
    println!("  Session: {}", report.session_id);
    println!("  Persisted: {}", if report.persisted { "yes" } else { "no" });
    println!();

    for outcome in &report.outcomes {
        let status = match &outcome.status {
            ProfessionStatus::Completed => "completed".to_string(),
            ProfessionStatus::NoResults => "no results".to_string(),
            ProfessionStatus::Failed(reason) => format!("failed: {}", reason),
            ProfessionStatus::TimedOut => "timed out".to_string(),
            ProfessionStatus::Cancelled => "cancelled".to_string(),
        };
        println!(
            "  {:<30} {:>6} vacancies  {:>4} formal  {:>4} extracted  [{}]",
            outcome.name,
            outcome.vacancy_count,
            outcome.formal_skills,
            outcome.extracted_skills,
            status
        );
        if outcome.pages_failed + outcome.items_failed + outcome.write_failures > 0 {
            println!(
                "  {:<30} skipped {} pages, {} vacancies; {} failed writes",
                "", outcome.pages_failed, outcome.items_failed, outcome.write_failures
            );
        }
    }

    println!(
        "\n✓ {}/{} professions completed, {} vacancies counted",
        report.completed(),
        report.outcomes.len(),
        report.total_vacancies()
    );
}
