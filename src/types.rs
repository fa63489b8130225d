//! Shared types for FARESCAN.
//!
//! These types form the data model used across all modules: the validated
//! search request, the per-date price record, the sorted result set, and
//! the typed outcome of a single date's query.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// IATA codes
// ---------------------------------------------------------------------------

/// A 3-letter uppercase airport or city identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IataCode(String);

impl IataCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IataCode {
    type Err = FareScanError;

    /// Trims and uppercases the input; anything other than exactly three
    /// ASCII letters is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FareScanError::InvalidRequest(format!(
                "invalid IATA code '{}': expected exactly 3 letters",
                s.trim()
            )));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for IataCode {
    type Error = FareScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IataCode> for String {
    fn from(code: IataCode) -> Self {
        code.0
    }
}

impl fmt::Display for IataCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// One invocation's route and scan window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub origin: IataCode,
    pub destination: IataCode,
    /// Number of consecutive departure dates to scan, starting tomorrow.
    pub day_count: u32,
}

impl SearchRequest {
    pub fn new(origin: IataCode, destination: IataCode, day_count: u32) -> Result<Self, FareScanError> {
        if origin == destination {
            return Err(FareScanError::InvalidRequest(format!(
                "origin and destination are both {origin}"
            )));
        }
        Ok(Self { origin, destination, day_count })
    }

    /// Validate raw user input into a request.
    pub fn parse(origin: &str, destination: &str, day_count: u32) -> Result<Self, FareScanError> {
        Self::new(origin.parse()?, destination.parse()?, day_count)
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({} days)", self.origin, self.destination, self.day_count)
    }
}

// ---------------------------------------------------------------------------
// Price record
// ---------------------------------------------------------------------------

/// The single cheapest offer found for one departure date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Departure date, serialised as YYYY-MM-DD.
    pub date: NaiveDate,
    pub price: Decimal,
    /// ISO 4217 code as reported by the offer. Not normalised.
    pub currency: String,
    /// First validating airline code.
    pub airline: String,
    pub offer_id: String,
}

impl PriceRecord {
    /// Price with its currency, e.g. `"412.30 EUR"`.
    pub fn price_label(&self) -> String {
        format!("{} {}", self.price, self.currency)
    }
}

impl fmt::Display for PriceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, offer {})",
            self.date.format("%Y-%m-%d"),
            self.price_label(),
            self.airline,
            self.offer_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Result set
// ---------------------------------------------------------------------------

/// Price records sorted ascending by price.
///
/// The only constructor sorts, so adjacent records always satisfy
/// `price[i] <= price[i + 1]`. Ties keep their scan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<PriceRecord>);

impl ResultSet {
    pub fn from_unsorted(mut records: Vec<PriceRecord>) -> Self {
        records.sort_by(|a, b| a.price.cmp(&b.price));
        Self(records)
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The best deal, if any date produced an offer.
    pub fn cheapest(&self) -> Option<&PriceRecord> {
        self.0.first()
    }

    /// At most `n` of the cheapest records.
    pub fn top(&self, n: usize) -> &[PriceRecord] {
        &self.0[..n.min(self.0.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceRecord> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<PriceRecord> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a PriceRecord;
    type IntoIter = std::slice::Iter<'a, PriceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Query outcome
// ---------------------------------------------------------------------------

/// Result of querying one departure date.
///
/// Only `Found` contributes to the result set; the other variants are
/// absorbed by the scanner and surface through logs and the scan summary.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Found(PriceRecord),
    /// The service answered but had no offers for this route/date.
    NoOffers,
    /// The service returned a recognised API error (rate limit, invalid
    /// date, no availability reported as an error).
    Rejected { status: u16, detail: String },
    /// Transport failure, malformed response, or unparseable offer.
    Failed(String),
}

impl QueryOutcome {
    pub fn into_record(self) -> Option<PriceRecord> {
        match self {
            QueryOutcome::Found(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Found(r) => write!(f, "found {}", r.price_label()),
            QueryOutcome::NoOffers => write!(f, "no offers"),
            QueryOutcome::Rejected { status, detail } => write!(f, "rejected ({status}): {detail}"),
            QueryOutcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan summary
// ---------------------------------------------------------------------------

/// Per-outcome counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub dates_scanned: u32,
    pub found: u32,
    pub no_offers: u32,
    pub rejected: u32,
    pub failed: u32,
    /// The scan stopped early on a shutdown signal.
    pub interrupted: bool,
}

impl ScanSummary {
    pub fn record(&mut self, outcome: &QueryOutcome) {
        self.dates_scanned += 1;
        match outcome {
            QueryOutcome::Found(_) => self.found += 1,
            QueryOutcome::NoOffers => self.no_offers += 1,
            QueryOutcome::Rejected { .. } => self.rejected += 1,
            QueryOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} found={} no_offers={} rejected={} failed={}{}",
            self.dates_scanned,
            self.found,
            self.no_offers,
            self.rejected,
            self.failed,
            if self.interrupted { " (interrupted)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal errors. Per-date query failures are `QueryOutcome` values instead.
#[derive(Debug, thiserror::Error)]
pub enum FareScanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
