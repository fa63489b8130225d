//! Flight pricing integrations.
//!
//! Defines the `FlightPricing` trait and provides the Amadeus
//! Self-Service implementation:
//! - Amadeus: OAuth2-authenticated Flight Offers Search

pub mod amadeus;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{IataCode, QueryOutcome};

/// Abstraction over flight pricing services.
///
/// Implementors answer one question: what is the cheapest offer for a
/// single adult on this route and date? Failures are reported through
/// `QueryOutcome` rather than `Err` so a scan can always continue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlightPricing: Send + Sync {
    /// Query the cheapest one-way offer departing on `date`.
    async fn cheapest_offer_for_date(
        &self,
        origin: &IataCode,
        destination: &IataCode,
        date: NaiveDate,
    ) -> QueryOutcome;
}
