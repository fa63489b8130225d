//! Command-line arguments and interactive prompting.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

/// Flight ticket price tracker: cheapest fare for each departure date
#[derive(Parser, Debug)]
#[command(name = "farescan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of days to search, starting tomorrow [default: 60]
    #[arg(long)]
    pub days: Option<u32>,

    /// Origin IATA code, e.g. JFK (prompted for if omitted)
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Destination IATA code, e.g. LHR (prompted for if omitted)
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Number of cheapest dates to show [default: 10]
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn day_count(&self, config: &AppConfig) -> u32 {
        self.days.unwrap_or(config.scan.default_days)
    }

    pub fn limit(&self, config: &AppConfig) -> usize {
        self.limit.unwrap_or(config.display.limit)
    }
}

/// Print `label` and read one line, uppercased and trimmed.
pub fn prompt<R: BufRead, W: Write>(label: &str, input: &mut R, output: &mut W) -> Result<String> {
    write!(output, "{label}").context("Failed to write prompt")?;
    output.flush().context("Failed to flush prompt")?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim().to_uppercase())
}

/// Use the flag value if given, otherwise ask for it.
pub fn value_or_prompt<R: BufRead, W: Write>(
    value: Option<String>,
    label: &str,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    match value {
        Some(v) => Ok(v.trim().to_uppercase()),
        None => prompt(label, input, output),
    }
}
