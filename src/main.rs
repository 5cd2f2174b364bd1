//! Cross-venue and cyclic arbitrage engine entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use venue_arb::api::{create_router, AppState};
use venue_arb::arbitrage::{build_triangles, Cycle};
use venue_arb::config::{load_venues, Config};
use venue_arb::execution::{ExecutionSettings, ExecutionSlots, Orchestrator};
use venue_arb::metrics;
use venue_arb::notify::{LogSink, Notifier, WebhookSink};
use venue_arb::scan::Scanner;
use venue_arb::utils::shutdown_signal;
use venue_arb::venue::{RateLimiter, RestVenue, Throttled, VenueRegistry};

#[derive(Parser, Debug)]
#[command(name = "venue-arb", about = "Cross-venue and cyclic crypto arbitrage engine")]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Run in dry-run mode (no real orders or withdrawals).
    #[arg(long)]
    dry_run: Option<bool>,

    /// HTTP server port for health/metrics.
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scan loop (default).
    Run {
        /// Run in dry-run mode (no real orders or withdrawals).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Execute qualifying opportunities without operator action.
        #[arg(long)]
        auto_execute: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// List the configured venues and their fee schedules.
    ListVenues,

    /// Run a single scan round and print the opportunities found.
    ScanOnce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("venue_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::ListVenues) => cmd_list_venues().await,
        Some(Command::ScanOnce) => cmd_scan_once().await,
        Some(Command::Run {
            dry_run,
            port,
            auto_execute,
        }) => cmd_run(dry_run, port, auto_execute).await,
        None => cmd_run(args.dry_run, args.port, false).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("VENUE ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Parse the venues file
    print!("Reading venues file... ");
    let venues = match load_venues(&config.venues_file) {
        Ok(v) => {
            println!("OK ({} venues)", v.len());
            v
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Venues file invalid"));
        }
    };

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Symbols: {}", config.symbols);
    println!("  Anchor currency: {}", config.anchor_currency);
    println!("  Report threshold: {}", config.min_report_threshold);
    println!("  Execute threshold: {}", config.min_execute_threshold);
    println!("  Investment: {}", config.investment);
    println!("  Scan interval: {}s", config.scan_interval_secs);
    println!("  Quote timeout: {}ms", config.quote_timeout_ms);
    println!("  Auto-execute: {}", config.auto_execute);
    println!("  Dry run: {}", config.dry_run);
    println!("  Venues: {}", venues.len());
    for venue in &venues {
        println!("    - {} ({})", venue.id, venue.base_url);
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// List the configured venues and their fee schedules.
async fn cmd_list_venues() -> anyhow::Result<()> {
    let config = Config::load()?;
    let venues = load_venues(&config.venues_file)?;

    println!("{} venue(s) configured:", venues.len());
    for settings in &venues {
        let profile = settings.profile();
        println!("----------------------------------------------------------------------");
        println!("  Id: {}", profile.id);
        println!("  URL: {}", settings.base_url);
        println!("  Taker fee: {}", profile.taker_fee);
        println!("  Maker fee: {}", profile.maker_fee);
        println!("  Rate limit: {}/s", settings.rate_limit_per_sec);
        for (currency, fee) in &profile.withdrawal_fees {
            println!("  Withdrawal fee {}: {}", currency, fee);
        }
        for (destination, minutes) in &profile.transfer_minutes {
            println!("  Transfer to {}: ~{}min", destination, minutes);
        }
    }

    Ok(())
}

/// Run a single scan round and print the opportunities found.
async fn cmd_scan_once() -> anyhow::Result<()> {
    let config = load_and_validate(None, None)?;
    let registry = Arc::new(build_registry(&config)?);
    let cycles = discover_cycles(&registry, &config).await;

    let (_tx, rx) = watch::channel(false);
    let scanner = build_scanner(&config, Arc::clone(&registry), cycles, rx, None)?;

    let opportunities = scanner.scan_round().await?;
    if opportunities.is_empty() {
        println!("No opportunities above {}", config.min_report_threshold);
        return Ok(());
    }

    println!("{} opportunity(ies):", opportunities.len());
    for opportunity in &opportunities {
        println!(
            "  [{}] {} net {} ({})",
            opportunity.kind,
            opportunity.path(),
            opportunity.expected_net,
            opportunity.profit_fraction,
        );
    }

    Ok(())
}

/// Run the scan loop.
async fn cmd_run(
    dry_run_override: Option<bool>,
    port: u16,
    auto_execute_override: bool,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_and_validate(
        dry_run_override,
        auto_execute_override.then_some(true),
    )?;

    info!("Configuration loaded successfully");
    info!(
        "Mode: {}",
        if config.dry_run { "SIMULATION" } else { "LIVE TRADING" }
    );
    info!("Report threshold: {}", config.min_report_threshold);
    info!("Execute threshold: {}", config.min_execute_threshold);
    info!("Auto-execute: {}", config.auto_execute);

    // Install the Prometheus recorder before anything records.
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();

    // Connect venues
    let registry = Arc::new(build_registry(&config)?);
    if registry.len() < 2 {
        warn!(
            venues = registry.len(),
            "fewer than two venues: cross-venue scanning is idle"
        );
    }

    // Create app state and HTTP server
    let app_state = AppState::new(Arc::clone(&registry), Some(prometheus));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    // Shutdown fan-out for the scanner and any in-flight executions
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // Enumerate cycles once at startup
    let cycles = discover_cycles(&registry, &config).await;
    info!(cycles = cycles.len(), "Cycle enumeration complete");

    let scanner = build_scanner(
        &config,
        Arc::clone(&registry),
        cycles,
        shutdown_rx,
        Some(Arc::clone(&app_state.stats)),
    )?;

    app_state.set_ready(true);
    scanner.run().await;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration, apply CLI overrides, validate.
fn load_and_validate(
    dry_run_override: Option<bool>,
    auto_execute_override: Option<bool>,
) -> anyhow::Result<Config> {
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    if let Some(auto_execute) = auto_execute_override {
        config.auto_execute = auto_execute;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Build the venue registry from the venues file, each gateway behind the
/// shared rate limiter.
fn build_registry(config: &Config) -> anyhow::Result<VenueRegistry> {
    let settings = load_venues(&config.venues_file)?;
    let mut registry = VenueRegistry::new();
    for venue in &settings {
        let gateway = RestVenue::new(venue, config.quote_timeout_ms)?;
        let limiter = Arc::new(RateLimiter::per_second(venue.rate_limit_per_sec as usize));
        registry.register(Arc::new(Throttled::new(gateway, limiter)));
    }
    Ok(registry)
}

/// Enumerate triangles on every venue from its listed pairs. A venue whose
/// pair list is unavailable simply contributes no cycles this run.
async fn discover_cycles(registry: &Arc<VenueRegistry>, config: &Config) -> Vec<Cycle> {
    let mut cycles = Vec::new();
    for gateway in registry.all() {
        match gateway.list_pairs().await {
            Ok(pairs) => {
                cycles.extend(build_triangles(
                    gateway.id(),
                    &config.anchor_currency,
                    &pairs,
                ));
            }
            Err(err) => {
                warn!(venue = %gateway.id(), %err, "pair listing unavailable, skipping cycles");
            }
        }
    }
    cycles
}

/// Wire the scanner together: orchestrator, notifier, thresholds.
fn build_scanner(
    config: &Config,
    registry: Arc<VenueRegistry>,
    cycles: Vec<Cycle>,
    shutdown: watch::Receiver<bool>,
    stats: Option<Arc<tokio::sync::RwLock<venue_arb::scan::ScanStats>>>,
) -> anyhow::Result<Scanner> {
    let pairs = config.pairs().map_err(|e| anyhow::anyhow!(e))?;

    let settings = ExecutionSettings {
        deposit_poll_interval: Duration::from_secs(config.deposit_poll_secs),
        deposit_timeout: Duration::from_secs(config.deposit_wait_timeout_secs),
        deposit_tolerance: ExecutionSettings::default().deposit_tolerance,
        dry_run: config.dry_run,
    };
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        Arc::new(ExecutionSlots::new()),
        settings,
        shutdown.clone(),
    ));

    let mut notifier = Notifier::new().with_sink(Box::new(LogSink));
    if let Some(url) = &config.webhook_url {
        notifier = notifier.with_sink(Box::new(WebhookSink::new(url)));
    }

    Ok(Scanner::new(
        config,
        registry,
        orchestrator,
        Arc::new(notifier),
        pairs,
        cycles,
        stats.unwrap_or_default(),
        shutdown,
    ))
}
