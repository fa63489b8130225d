//! Console rendering of scan results.
//!
//! Formats the ranked fare table, the best-deal line, and a JSON dump,
//! and provides a single-line progress indicator for the scan.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;

use crate::engine::ScanObserver;
use crate::types::{PriceRecord, ResultSet, ScanSummary, SearchRequest};

pub const NO_FLIGHTS_MESSAGE: &str = "No flights found. Check your route or API quota.";

const HEADERS: [&str; 3] = ["Date", "Price", "Airline"];

/// Render at most `limit` of the cheapest records as a text table.
pub fn render_table(request: &SearchRequest, results: &ResultSet, limit: usize) -> String {
    let rows: Vec<[String; 3]> = results
        .top(limit)
        .iter()
        .map(|r| [r.date.format("%Y-%m-%d").to_string(), r.price_label(), r.airline.clone()])
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "─".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("┼");
    let format_row = |cells: [&str; 3]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!(" {cell:<w$} "))
            .collect::<Vec<_>>()
            .join("│")
    };

    let mut out = String::new();
    out.push_str(&format!(
        "Cheapest Flights: {} -> {}\n",
        request.origin, request.destination
    ));
    out.push_str(&format_row(HEADERS));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    for row in &rows {
        out.push_str(&format_row([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
        out.push('\n');
    }
    if results.len() > rows.len() {
        out.push_str(&format!("({} more dates not shown)\n", results.len() - rows.len()));
    }
    out
}

/// `Best Deal: <date> for <price> <currency>`, or `None` when empty.
pub fn best_deal_line(results: &ResultSet) -> Option<String> {
    results.cheapest().map(|best| {
        format!(
            "Best Deal: {} for {}",
            best.date.format("%Y-%m-%d"),
            best.price_label()
        )
    })
}

/// Pretty-printed JSON array of the cheapest `limit` records.
pub fn render_json(results: &ResultSet, limit: usize) -> Result<String> {
    let top: &[PriceRecord] = results.top(limit);
    serde_json::to_string_pretty(top).context("Failed to serialise results")
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

/// Greeting shown before the route is collected.
pub fn write_banner<W: Write>(out: &mut W, day_count: u32) -> Result<()> {
    writeln!(out, "Flight Ticket Price Tracker")?;
    writeln!(out, "Tracks cheapest flights for the next {day_count} days.\n")?;
    Ok(())
}

pub fn write_status<W: Write>(out: &mut W, request: &SearchRequest) -> Result<()> {
    writeln!(
        out,
        "\nSearching for flights from {} to {}...",
        request.origin, request.destination
    )?;
    Ok(())
}

/// Write the final scan output.
///
/// In JSON mode only the array is written, so `out` stays parseable.
pub fn write_results<W: Write>(
    out: &mut W,
    request: &SearchRequest,
    results: &ResultSet,
    limit: usize,
    json: bool,
) -> Result<()> {
    if json {
        writeln!(out, "{}", render_json(results, limit)?)?;
        return Ok(());
    }

    if results.is_empty() {
        writeln!(out, "\n{NO_FLIGHTS_MESSAGE}")?;
        return Ok(());
    }

    writeln!(out, "\n{}", render_table(request, results, limit))?;
    if let Some(best) = best_deal_line(results) {
        writeln!(out, "{best}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Rewrites a single stderr line as dates are scanned.
pub struct ProgressLine;

impl ScanObserver for ProgressLine {
    fn on_date_started(&self, index: usize, total: usize, date: NaiveDate) {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\rScanning dates... [{:>width$}/{total}] {date}", index + 1, width = digits(total));
        let _ = err.flush();
    }

    fn on_scan_finished(&self, summary: &ScanSummary) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err);
        if summary.interrupted {
            let _ = writeln!(err, "Scan interrupted after {} dates.", summary.dates_scanned);
        }
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
