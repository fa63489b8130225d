//! Amadeus Self-Service flight pricing integration.
//!
//! API docs: https://developers.amadeus.com/self-service/category/flights
//! Test base URL: https://test.api.amadeus.com
//! Production base URL: https://api.amadeus.com
//! Auth: OAuth2 client-credentials grant at `/v1/security/oauth2/token`.
//! Search: `GET /v2/shopping/flight-offers`
//!
//! Offers come back ranked by price, so asking for `max=1` yields the
//! cheapest offer for the date. Error responses carry a JSON body of the
//! form `{"errors": [{"status": 400, "code": 477, "title": "...", "detail": "..."}]}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::FlightPricing;
use crate::config::AmadeusConfig;
use crate::types::{FareScanError, IataCode, PriceRecord, QueryOutcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";

/// Passenger count for every search.
const ADULTS: &str = "1";

/// Only the top-ranked (cheapest) offer is needed.
const MAX_OFFERS: &str = "1";

/// Refresh the token this long before the server-side expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Amadeus tokens normally live for 1799s; used if `expires_in` is absent.
const DEFAULT_TOKEN_TTL_SECS: u64 = 1799;

// ---------------------------------------------------------------------------
// Amadeus API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_ttl")]
    expires_in: u64,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

/// Flight Offers Search response. `dictionaries` and `meta` are ignored.
#[derive(Debug, Deserialize)]
struct FlightOffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightOffer {
    id: String,
    price: OfferPrice,
    #[serde(default)]
    validating_airline_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    currency: String,
    /// Decimal amount encoded as a string, e.g. `"546.70"`.
    total: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(code) = self.code {
            parts.push(format!("[{code}]"));
        }
        if let Some(title) = &self.title {
            parts.push(title.clone());
        }
        if let Some(detail) = &self.detail {
            parts.push(format!("- {detail}"));
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API key and secret. Both are redacted in `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    api_key: SecretString,
    api_secret: SecretString,
}

impl Credentials {
    /// Build credentials, rejecting missing or blank values.
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Result<Self, FareScanError> {
        let api_key = require_value("API key", api_key)?;
        let api_secret = require_value("API secret", api_secret)?;
        Ok(Self {
            api_key: SecretString::new(api_key),
            api_secret: SecretString::new(api_secret),
        })
    }

    /// Read credentials from the named environment variables.
    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, FareScanError> {
        let api_key = std::env::var(key_var).ok();
        let api_secret = std::env::var(secret_var).ok();
        Self::new(api_key, api_secret).map_err(|_| {
            FareScanError::Configuration(format!(
                "API keys not found: set {key_var} and {secret_var} in the environment or a .env file"
            ))
        })
    }
}

fn require_value(label: &str, value: Option<String>) -> Result<String, FareScanError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FareScanError::Configuration(format!("{label} is missing or empty"))),
    }
}

/// Credentials end up in a form body; whitespace or control characters
/// mean a copy-paste error rather than a real key.
fn validate_secret(label: &str, secret: &SecretString) -> Result<(), FareScanError> {
    if secret
        .expose_secret()
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(FareScanError::Initialization(format!(
            "{label} contains whitespace or control characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

/// Amadeus Flight Offers Search client.
#[derive(Debug)]
pub struct AmadeusClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    /// Create a client from explicit credentials.
    ///
    /// No network traffic happens here; the first token is requested
    /// lazily on the first search.
    pub fn new(credentials: Credentials, config: &AmadeusConfig) -> Result<Self, FareScanError> {
        validate_secret("API key", &credentials.api_key)?;
        validate_secret("API secret", &credentials.api_secret)?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            FareScanError::Initialization(format!("invalid Amadeus base URL '{}': {e}", config.base_url))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(FareScanError::Initialization(format!(
                "unsupported URL scheme '{}' for Amadeus base URL",
                base_url.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent("FARESCAN/0.1.0 (fare-scanner)")
            .build()
            .map_err(|e| {
                FareScanError::Initialization(format!("Failed to build HTTP client for Amadeus: {e}"))
            })?;

        Ok(Self {
            http,
            base_url,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Create a client using the env-var names from configuration.
    pub fn from_config(config: &AmadeusConfig) -> Result<Self, FareScanError> {
        let credentials = Credentials::from_env(&config.api_key_env, &config.api_secret_env)?;
        Self::new(credentials, config)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    // -- Authentication --------------------------------------------------

    async fn request_token(&self) -> Result<AccessToken> {
        let url = self.endpoint(TOKEN_PATH);
        debug!(url = %url, "Requesting Amadeus access token");

        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.api_key.expose_secret().as_str()),
                ("client_secret", self.credentials.api_secret.expose_secret().as_str()),
            ])
            .send()
            .await
            .context("Amadeus token request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Amadeus authentication failed {status}: {}", summarise_error_body(&body));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse Amadeus token response")?;

        info!(expires_in = token.expires_in, "Amadeus authentication successful");

        Ok(AccessToken {
            value: SecretString::new(token.access_token),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// Get a valid bearer token, authenticating if necessary.
    async fn bearer_token(&self) -> Result<SecretString> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }
        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    // -- Search ----------------------------------------------------------

    async fn send_search(
        &self,
        token: &SecretString,
        origin: &IataCode,
        destination: &IataCode,
        date: &str,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(FLIGHT_OFFERS_PATH);
        self.http
            .get(&url)
            .bearer_auth(token.expose_secret())
            .query(&[
                ("originLocationCode", origin.as_str()),
                ("destinationLocationCode", destination.as_str()),
                ("departureDate", date),
                ("adults", ADULTS),
                ("max", MAX_OFFERS),
            ])
            .send()
            .await
            .context("Amadeus flight-offers request failed")
    }

    async fn search(
        &self,
        origin: &IataCode,
        destination: &IataCode,
        date: NaiveDate,
    ) -> Result<QueryOutcome> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let token = self.bearer_token().await?;
        let mut resp = self.send_search(&token, origin, destination, &date_str).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            // Token revoked or expired early; authenticate again once
            warn!("Amadeus token rejected, re-authenticating...");
            self.invalidate_token().await;
            let token = self.bearer_token().await?;
            resp = self.send_search(&token, origin, destination, &date_str).await?;
        }

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read Amadeus flight-offers response")?;

        if !status.is_success() {
            return Ok(classify_error(status, &body));
        }

        Ok(parse_offers(date, &body))
    }
}

// ---------------------------------------------------------------------------
// Response normalisation
// ---------------------------------------------------------------------------

/// Turn a successful search body into an outcome for `date`.
fn parse_offers(date: NaiveDate, body: &str) -> QueryOutcome {
    let response: FlightOffersResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return QueryOutcome::Failed(format!("malformed flight-offers response: {e}")),
    };

    let Some(offer) = response.data.into_iter().next() else {
        return QueryOutcome::NoOffers;
    };

    match offer_to_record(date, offer) {
        Ok(record) => QueryOutcome::Found(record),
        Err(msg) => QueryOutcome::Failed(msg),
    }
}

fn offer_to_record(date: NaiveDate, offer: FlightOffer) -> std::result::Result<PriceRecord, String> {
    let price = Decimal::from_str(offer.price.total.trim())
        .map_err(|e| format!("offer {}: unparseable total '{}': {e}", offer.id, offer.price.total))?;
    if price.is_sign_negative() {
        return Err(format!("offer {}: negative total {price}", offer.id));
    }

    let airline = offer
        .validating_airline_codes
        .into_iter()
        .next()
        .ok_or_else(|| format!("offer {}: no validating airline", offer.id))?;

    Ok(PriceRecord {
        date,
        price,
        currency: offer.price.currency,
        airline,
        offer_id: offer.id,
    })
}

/// Map a non-success response to an outcome. A parseable Amadeus error
/// body is a recognised rejection; anything else is unexpected.
fn classify_error(status: StatusCode, body: &str) -> QueryOutcome {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            let detail = parsed
                .errors
                .iter()
                .map(ApiError::describe)
                .collect::<Vec<_>>()
                .join("; ");
            let status = parsed
                .errors
                .iter()
                .find_map(|e| e.status)
                .unwrap_or_else(|| status.as_u16());
            QueryOutcome::Rejected { status, detail }
        }
        _ => QueryOutcome::Failed(format!("HTTP {status}: {}", truncate(body, 200))),
    }
}

fn summarise_error_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => v
            .get("error_description")
            .or_else(|| v.get("error"))
            .and_then(|e| e.as_str())
            .map(String::from)
            .unwrap_or_else(|| truncate(body, 200)),
        Err(_) => truncate(body, 200),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

// ---------------------------------------------------------------------------
// FlightPricing trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl FlightPricing for AmadeusClient {
    async fn cheapest_offer_for_date(
        &self,
        origin: &IataCode,
        destination: &IataCode,
        date: NaiveDate,
    ) -> QueryOutcome {
        match self.search(origin, destination, date).await {
            Ok(outcome) => {
                debug!(%date, outcome = %outcome, "Amadeus search complete");
                outcome
            }
            Err(e) => QueryOutcome::Failed(format!("{e:#}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
