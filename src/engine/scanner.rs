//! Date-window fare scanner.
//!
//! Walks a window of departure dates starting tomorrow, asks the pricing
//! service for the cheapest offer on each date (strictly one request at a
//! time), absorbs per-date failures, and returns every offer found sorted
//! by price.

use chrono::{Local, NaiveDate};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::pricing::amadeus::AmadeusClient;
use crate::pricing::FlightPricing;
use crate::types::{FareScanError, IataCode, QueryOutcome, ResultSet, ScanSummary, SearchRequest};

// ---------------------------------------------------------------------------
// Date window
// ---------------------------------------------------------------------------

/// The first departure date considered: the local date plus one day.
pub fn tomorrow() -> NaiveDate {
    Local::now().date_naive() + chrono::Duration::days(1)
}

/// `day_count` consecutive dates beginning at `start`, ascending.
pub fn date_range(start: NaiveDate, day_count: u32) -> Vec<NaiveDate> {
    start.iter_days().take(day_count as usize).collect()
}

/// Resolve when `signal` fires. If the signal could not be registered
/// the future never resolves, so the scan runs to completion.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "Shutdown signal unavailable, scan cannot be interrupted");
        futures::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Receives progress callbacks during a scan. All methods default to no-ops.
pub trait ScanObserver: Send + Sync {
    fn on_date_started(&self, _index: usize, _total: usize, _date: NaiveDate) {}

    fn on_date_finished(&self, _index: usize, _total: usize, _date: NaiveDate, _outcome: &QueryOutcome) {}

    fn on_scan_finished(&self, _summary: &ScanSummary) {}
}

/// Observer that ignores every event.
pub struct NullObserver;

impl ScanObserver for NullObserver {}

// ---------------------------------------------------------------------------
// Scan aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ScanSettings {
    /// Pause between consecutive requests. Not applied before the first.
    pub request_delay: Duration,
}

impl ScanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_delay: config.scan.request_delay(),
        }
    }
}

/// Drives one pricing query per date and aggregates the results.
pub struct ScanAggregator<P: FlightPricing> {
    pricing: P,
    settings: ScanSettings,
}

impl ScanAggregator<AmadeusClient> {
    /// Build a scanner backed by Amadeus, reading credentials from the
    /// environment. Fails before any network call if they are missing.
    pub fn from_config(config: &AppConfig) -> Result<Self, FareScanError> {
        let client = AmadeusClient::from_config(&config.amadeus)?;
        Ok(Self::new(client, ScanSettings::from_config(config)))
    }
}

impl<P: FlightPricing> ScanAggregator<P> {
    pub fn new(pricing: P, settings: ScanSettings) -> Self {
        Self { pricing, settings }
    }

    /// Scan `day_count` dates starting tomorrow and return every cheapest
    /// offer found, sorted ascending by price.
    pub async fn find_cheapest_flights(
        &self,
        origin: &IataCode,
        destination: &IataCode,
        day_count: u32,
    ) -> ResultSet {
        let request = SearchRequest {
            origin: origin.clone(),
            destination: destination.clone(),
            day_count,
        };
        let (results, _) = self
            .scan(&request, tomorrow(), &NullObserver, futures::future::pending())
            .await;
        results
    }

    /// Scan from an explicit start date, reporting progress to `observer`.
    ///
    /// If `shutdown` resolves mid-scan the in-flight query is dropped and
    /// whatever has been collected so far is sorted and returned.
    pub async fn scan<F>(
        &self,
        request: &SearchRequest,
        start: NaiveDate,
        observer: &dyn ScanObserver,
        shutdown: F,
    ) -> (ResultSet, ScanSummary)
    where
        F: Future<Output = ()>,
    {
        let dates = date_range(start, request.day_count);
        let total = dates.len();
        let mut collected = Vec::new();
        let mut summary = ScanSummary::default();

        tokio::pin!(shutdown);

        info!(
            origin = %request.origin,
            destination = %request.destination,
            days = total,
            start = %start,
            "Starting date scan"
        );

        for (index, date) in dates.into_iter().enumerate() {
            if index > 0 && !self.settings.request_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        summary.interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.request_delay) => {}
                }
            }

            observer.on_date_started(index, total, date);

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    summary.interrupted = true;
                    break;
                }
                outcome = self.pricing.cheapest_offer_for_date(
                    &request.origin,
                    &request.destination,
                    date,
                ) => outcome,
            };

            match &outcome {
                QueryOutcome::Found(record) => {
                    debug!(%date, price = %record.price, currency = %record.currency, airline = %record.airline, "Offer found");
                }
                QueryOutcome::NoOffers => {
                    debug!(%date, "No offers for date");
                }
                QueryOutcome::Rejected { status, detail } => {
                    debug!(%date, status, detail = %detail, "Pricing service rejected query");
                }
                QueryOutcome::Failed(error) => {
                    warn!(%date, error = %error, "Query failed, continuing scan");
                }
            }

            observer.on_date_finished(index, total, date, &outcome);
            summary.record(&outcome);

            if let Some(record) = outcome.into_record() {
                collected.push(record);
            }
        }

        if summary.interrupted {
            warn!(
                scanned = summary.dates_scanned,
                total,
                "Scan interrupted, returning partial results"
            );
        }

        let results = ResultSet::from_unsorted(collected);
        observer.on_scan_finished(&summary);

        info!(
            scanned = summary.dates_scanned,
            found = summary.found,
            no_offers = summary.no_offers,
            rejected = summary.rejected,
            failed = summary.failed,
            "Date scan complete"
        );

        (results, summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::MockFlightPricing;
    use crate::types::PriceRecord;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    fn request(days: u32) -> SearchRequest {
        SearchRequest::parse("JFK", "LHR", days).unwrap()
    }

    fn found(date: NaiveDate, price: Decimal) -> QueryOutcome {
        QueryOutcome::Found(PriceRecord {
            date,
            price,
            currency: "USD".to_string(),
            airline: "BA".to_string(),
            offer_id: format!("offer-{date}"),
        })
    }

    /// Mock that answers from a per-date script and records call order.
    fn scripted(
        script: HashMap<NaiveDate, QueryOutcome>,
        calls: Arc<Mutex<Vec<NaiveDate>>>,
    ) -> MockFlightPricing {
        let mut mock = MockFlightPricing::new();
        mock.expect_cheapest_offer_for_date()
            .returning(move |_, _, date| {
                calls.lock().unwrap().push(date);
                script.get(&date).cloned().unwrap_or(QueryOutcome::NoOffers)
            });
        mock
    }

    // -- Date range --

    #[test]
    fn test_date_range_consecutive_ascending() {
        let dates = date_range(start(), 5);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], start());
        for pair in dates.windows(2) {
            assert_eq!(pair[1], pair[0] + chrono::Duration::days(1));
        }
    }

    #[test]
    fn test_date_range_zero() {
        assert!(date_range(start(), 0).is_empty());
    }

    #[test]
    fn test_date_range_crosses_month_and_year() {
        let dates = date_range(NaiveDate::from_ymd_opt(2026, 12, 30).unwrap(), 4);
        assert_eq!(dates[3], NaiveDate::from_ymd_opt(2027, 1, 2).unwrap());
    }

    #[test]
    fn test_tomorrow_is_after_today() {
        assert_eq!(tomorrow(), Local::now().date_naive().succ_opt().unwrap());
    }

    // -- Scanning --

    #[tokio::test]
    async fn test_scan_mixed_outcomes_sorted() {
        let d = date_range(start(), 3);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = HashMap::from([
            (d[0], found(d[0], dec!(200))),
            (d[1], QueryOutcome::NoOffers),
            (d[2], found(d[2], dec!(150))),
        ]);
        let scanner = ScanAggregator::new(scripted(script, calls.clone()), ScanSettings::default());

        let (results, summary) = scanner
            .scan(&request(3), start(), &NullObserver, futures::future::pending())
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results.records()[0].date, d[2]);
        assert_eq!(results.records()[0].price, dec!(150));
        assert_eq!(results.records()[1].date, d[0]);
        assert_eq!(results.records()[1].price, dec!(200));
        assert_eq!(*calls.lock().unwrap(), d);
        assert_eq!(summary.found, 2);
        assert_eq!(summary.no_offers, 1);
    }

    #[tokio::test]
    async fn test_scan_zero_days_makes_no_calls() {
        let mut mock = MockFlightPricing::new();
        mock.expect_cheapest_offer_for_date().times(0);
        let scanner = ScanAggregator::new(mock, ScanSettings::default());

        let (results, summary) = scanner
            .scan(&request(0), start(), &NullObserver, futures::future::pending())
            .await;

        assert!(results.is_empty());
        assert_eq!(summary.dates_scanned, 0);
    }

    #[tokio::test]
    async fn test_rejected_date_does_not_abort_scan() {
        let d = date_range(start(), 4);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = HashMap::from([
            (d[0], QueryOutcome::Rejected { status: 429, detail: "Too many requests".into() }),
            (d[1], found(d[1], dec!(80))),
            (d[2], QueryOutcome::Failed("connection reset".into())),
            (d[3], found(d[3], dec!(75))),
        ]);
        let scanner = ScanAggregator::new(scripted(script, calls.clone()), ScanSettings::default());

        let (results, summary) = scanner
            .scan(&request(4), start(), &NullObserver, futures::future::pending())
            .await;

        assert_eq!(calls.lock().unwrap().len(), 4);
        assert_eq!(results.len(), 2);
        assert_eq!(results.cheapest().unwrap().price, dec!(75));
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_all_dates_rejected_yields_empty() {
        let mut mock = MockFlightPricing::new();
        mock.expect_cheapest_offer_for_date()
            .times(3)
            .returning(|_, _, _| QueryOutcome::Rejected {
                status: 400,
                detail: "INVALID DATA RECEIVED".into(),
            });
        let scanner = ScanAggregator::new(mock, ScanSettings::default());

        let (results, summary) = scanner
            .scan(&request(3), start(), &NullObserver, futures::future::pending())
            .await;

        assert!(results.is_empty());
        assert_eq!(summary.rejected, 3);
        assert!(!summary.interrupted);
    }

    #[tokio::test]
    async fn test_route_passed_through() {
        let mut mock = MockFlightPricing::new();
        mock.expect_cheapest_offer_for_date()
            .withf(|origin, destination, _| origin.as_str() == "JFK" && destination.as_str() == "LHR")
            .times(2)
            .returning(|_, _, _| QueryOutcome::NoOffers);
        let scanner = ScanAggregator::new(mock, ScanSettings::default());

        let (results, _) = scanner
            .scan(&request(2), start(), &NullObserver, futures::future::pending())
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_find_cheapest_flights_starts_tomorrow() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let scanner = ScanAggregator::new(scripted(HashMap::new(), calls.clone()), ScanSettings::default());

        let origin: IataCode = "SYD".parse().unwrap();
        let destination: IataCode = "MEL".parse().unwrap();
        let results = scanner.find_cheapest_flights(&origin, &destination, 3).await;

        assert!(results.is_empty());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], tomorrow());
    }

    #[test]
    fn test_find_cheapest_flights_zero_days_blocking() {
        let mut mock = MockFlightPricing::new();
        mock.expect_cheapest_offer_for_date().times(0);
        let scanner = ScanAggregator::new(mock, ScanSettings::default());
        let origin: IataCode = "SYD".parse().unwrap();
        let destination: IataCode = "MEL".parse().unwrap();

        let results = tokio_test::block_on(scanner.find_cheapest_flights(&origin, &destination, 0));
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_returns_sorted_partial_results() {
        let d = date_range(start(), 5);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let prices = [dec!(300), dec!(120)];
        let count = Arc::new(Mutex::new(0usize));

        let mut mock = MockFlightPricing::new();
        {
            let count = count.clone();
            mock.expect_cheapest_offer_for_date()
                .returning(move |_, _, date| {
                    let mut n = count.lock().unwrap();
                    let outcome = found(date, prices[*n]);
                    *n += 1;
                    if *n == 2 {
                        if let Some(tx) = tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                    }
                    outcome
                });
        }
        let scanner = ScanAggregator::new(mock, ScanSettings::default());

        let shutdown = async {
            let _ = rx.await;
        };
        let (results, summary) = scanner.scan(&request(5), start(), &NullObserver, shutdown).await;

        assert!(summary.interrupted);
        assert_eq!(summary.dates_scanned, 2);
        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results.records()[0].date, d[1]);
        assert_eq!(results.records()[1].date, d[0]);
    }

    #[tokio::test]
    async fn test_request_delay_still_scans_every_date() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let scanner = ScanAggregator::new(
            scripted(HashMap::new(), calls.clone()),
            ScanSettings {
                request_delay: Duration::from_millis(1),
            },
        );

        let (_, summary) = scanner
            .scan(&request(3), start(), &NullObserver, futures::future::pending())
            .await;

        assert_eq!(summary.dates_scanned, 3);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    // -- Observer --

    #[derive(Default)]
    struct RecordingObserver {
        started: Mutex<Vec<(usize, usize)>>,
        finished: Mutex<Vec<bool>>,
        summaries: Mutex<Vec<ScanSummary>>,
    }

    impl ScanObserver for RecordingObserver {
        fn on_date_started(&self, index: usize, total: usize, _date: NaiveDate) {
            self.started.lock().unwrap().push((index, total));
        }

        fn on_date_finished(&self, _index: usize, _total: usize, _date: NaiveDate, outcome: &QueryOutcome) {
            self.finished.lock().unwrap().push(outcome.is_found());
        }

        fn on_scan_finished(&self, summary: &ScanSummary) {
            self.summaries.lock().unwrap().push(*summary);
        }
    }

    #[tokio::test]
    async fn test_observer_sees_every_date() {
        let d = date_range(start(), 2);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = HashMap::from([(d[1], found(d[1], dec!(42)))]);
        let scanner = ScanAggregator::new(scripted(script, calls), ScanSettings::default());
        let observer = RecordingObserver::default();

        scanner
            .scan(&request(2), start(), &observer, futures::future::pending())
            .await;

        assert_eq!(*observer.started.lock().unwrap(), vec![(0, 2), (1, 2)]);
        assert_eq!(*observer.finished.lock().unwrap(), vec![false, true]);
        assert_eq!(observer.summaries.lock().unwrap().len(), 1);
        assert_eq!(observer.summaries.lock().unwrap()[0].found, 1);
    }

    // -- Construction --

    // -- Shutdown signal --

    #[tokio::test]
    async fn test_shutdown_on_signal_fires() {
        let signal = async { Ok::<(), std::io::Error>(()) };
        let fired = tokio::time::timeout(Duration::from_millis(100), shutdown_on(signal)).await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_on_registration_error_never_fires() {
        let signal = async { Err::<(), _>(std::io::Error::other("no signal handler")) };
        let fired = tokio::time::timeout(Duration::from_millis(50), shutdown_on(signal)).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_failed_signal_does_not_interrupt_scan() {
        let d = date_range(start(), 3);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = HashMap::from([(d[0], found(d[0], dec!(80)))]);
        let scanner = ScanAggregator::new(scripted(script, calls.clone()), ScanSettings::default());
        let signal = async { Err::<(), _>(std::io::Error::other("no signal handler")) };

        let (results, summary) = scanner
            .scan(&request(3), start(), &NullObserver, shutdown_on(signal))
            .await;

        assert_eq!(results.len(), 1);
        assert!(!summary.interrupted);
        assert_eq!(summary.dates_scanned, 3);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_from_config_missing_credentials() {
        let mut config = AppConfig::default();
        config.amadeus.api_key_env = "FARESCAN_TEST_UNSET_KEY_44D0".into();
        config.amadeus.api_secret_env = "FARESCAN_TEST_UNSET_SECRET_44D0".into();

        match ScanAggregator::from_config(&config) {
            Err(FareScanError::Configuration(msg)) => {
                assert!(msg.contains("FARESCAN_TEST_UNSET_KEY_44D0"));
                assert!(msg.contains("FARESCAN_TEST_UNSET_SECRET_44D0"));
            }
            Err(other) => panic!("expected configuration error, got {other}"),
            Ok(_) => panic!("expected configuration error, got a scanner"),
        }
    }
}
