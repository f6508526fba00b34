//! Kraken public REST endpoints (order book depth and server time).
//!
//! Only unauthenticated market data lives here. Account and order calls
//! require a signed session, which is provided by the embedding
//! application through [`crate::ExchangeClient`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use midspread_core::{BookLevel, OrderBook, Price, Size};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::client::BoxFuture;
use crate::error::{ExecError, ExecResult};

/// Default Kraken REST base URL.
pub const DEFAULT_PUBLIC_URL: &str = "https://api.kraken.com";

/// Read-only market data source.
pub trait MarketData: Send + Sync {
    fn order_book<'a>(&'a self, pair: &'a str, depth: u32) -> BoxFuture<'a, ExecResult<OrderBook>>;

    fn server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>>;
}

/// Kraken response envelope: `{"error": [...], "result": {...}}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RawDepth {
    asks: Vec<Vec<Value>>,
    bids: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    unixtime: i64,
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> ExecResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.error.is_empty() {
        return Err(ExecError::Api(envelope.error.join(", ")));
    }
    envelope
        .result
        .ok_or_else(|| ExecError::Parse("response has no result".to_string()))
}

fn parse_levels(raw: &[Vec<Value>]) -> ExecResult<Vec<BookLevel>> {
    raw.iter()
        .map(|entry| {
            let field = |i: usize| -> ExecResult<&str> {
                entry
                    .get(i)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ExecError::Parse(format!("malformed book entry: {entry:?}")))
            };
            let price: Price = field(0)?
                .parse()
                .map_err(|e| ExecError::Parse(format!("bad price: {e}")))?;
            let volume: Size = field(1)?
                .parse()
                .map_err(|e| ExecError::Parse(format!("bad volume: {e}")))?;
            Ok(BookLevel::new(price, volume))
        })
        .collect()
}

/// Parse a `/0/public/Depth` response body.
///
/// The result is keyed by Kraken's canonical pair name, which may differ
/// from the requested alias, so the single entry is taken as-is.
pub fn parse_depth(body: &str) -> ExecResult<OrderBook> {
    let result: HashMap<String, RawDepth> = unwrap_envelope(body)?;
    let depth = result
        .into_values()
        .next()
        .ok_or_else(|| ExecError::Parse("depth result is empty".to_string()))?;
    Ok(OrderBook::new(
        parse_levels(&depth.asks)?,
        parse_levels(&depth.bids)?,
    ))
}

/// Parse a `/0/public/Time` response body.
pub fn parse_time(body: &str) -> ExecResult<DateTime<Utc>> {
    let time: RawTime = unwrap_envelope(body)?;
    DateTime::from_timestamp(time.unixtime, 0)
        .ok_or_else(|| ExecError::Parse(format!("unixtime out of range: {}", time.unixtime)))
}

/// HTTP client for Kraken public endpoints.
pub struct KrakenPublicClient {
    client: Client,
    base_url: String,
}

impl KrakenPublicClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ExecResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ExecResult<String> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ExecError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExecError::Http(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(ExecError::Http(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

impl MarketData for KrakenPublicClient {
    fn order_book<'a>(&'a self, pair: &'a str, depth: u32) -> BoxFuture<'a, ExecResult<OrderBook>> {
        Box::pin(async move {
            let body = self
                .get(
                    "/0/public/Depth",
                    &[("pair", pair.to_string()), ("count", depth.to_string())],
                )
                .await?;
            let book = parse_depth(&body)?;
            debug!(
                pair,
                asks = book.asks.len(),
                bids = book.bids.len(),
                "Fetched order book"
            );
            Ok(book)
        })
    }

    fn server_time(&self) -> BoxFuture<'_, ExecResult<DateTime<Utc>>> {
        Box::pin(async move {
            let body = self.get("/0/public/Time", &[]).await?;
            parse_time(&body)
        })
    }
}
