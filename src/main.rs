//! FARESCAN: cheapest-fare scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! collects the route, runs the date scan with Ctrl+C support, and
//! prints the ranked results.

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tracing::info;

use farescan::cli::{value_or_prompt, Cli};
use farescan::config::AppConfig;
use farescan::engine::{shutdown_on, tomorrow, ScanAggregator};
use farescan::report::{self, ProgressLine};
use farescan::types::{FareScanError, SearchRequest};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(&cli.config)?;

    init_logging();

    let day_count = cli.day_count(&cfg);
    let limit = cli.limit(&cfg);

    // With --json, stdout carries only the result array
    let mut console: Box<dyn Write> = if cli.json {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };

    report::write_banner(&mut console, day_count)?;

    // -- Route -----------------------------------------------------------

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let origin = value_or_prompt(cli.origin.clone(), "Enter Origin (IATA code, e.g., JFK): ", &mut input, &mut console)?;
    let destination = value_or_prompt(
        cli.destination.clone(),
        "Enter Destination (IATA code, e.g., LHR): ",
        &mut input,
        &mut console,
    )?;
    drop(input);

    let request = match SearchRequest::parse(&origin, &destination, day_count) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}. Please use 3-letter IATA codes.");
            return Ok(ExitCode::FAILURE);
        }
    };

    // -- Client ----------------------------------------------------------

    let scanner = match ScanAggregator::from_config(&cfg) {
        Ok(s) => s,
        Err(FareScanError::Configuration(msg)) => {
            eprintln!("Configuration Error: {msg}");
            eprintln!(
                "Please create a .env file with {} and {}.",
                cfg.amadeus.api_key_env, cfg.amadeus.api_secret_env
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    // -- Scan ------------------------------------------------------------

    report::write_status(&mut console, &request)?;

    let shutdown = shutdown_on(tokio::signal::ctrl_c());
    let (results, summary) = scanner.scan(&request, tomorrow(), &ProgressLine, shutdown).await;

    info!(
        route = %request,
        summary = %summary,
        "Scan finished"
    );

    let mut stdout = std::io::stdout().lock();
    report::write_results(&mut stdout, &request, &results, limit, cli.json)?;

    Ok(ExitCode::SUCCESS)
}

/// Initialise the `tracing` subscriber.
///
/// Defaults to warnings only so log lines don't interleave with the
/// progress display; override with `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("farescan=warn"));

    let json_logging = std::env::var("FARESCAN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
