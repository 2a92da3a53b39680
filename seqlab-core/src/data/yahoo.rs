//! Yahoo Finance market data source.
//!
//! Fetches intraday or daily OHLCV bars from Yahoo's v8 chart API. Handles
//! provider-side throttling, retries with exponential backoff, response
//! parsing, and the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. Intraday history is limited (about 60 days for 30m bars), so a
//! request beyond that comes back empty rather than failing.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{BarRequest, DataError, MarketDataSource};
use crate::domain::Bar;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooSource {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// In-source retries of throttled or unreachable requests. Set to zero
    /// when the caller retries through its own rate limiter.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn chart_url(request: &BarRequest) -> Result<String, DataError> {
        let start_ts = request.start()?.and_utc().timestamp();
        let end_ts = request.end.and_utc().timestamp();
        Ok(format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{}\
             ?period1={start_ts}&period2={end_ts}&interval={}\
             &includePrePost=false",
            request.symbol,
            request.bar_size.chart_interval()
        ))
    }

    /// Parse the chart API response into bars, in exchange-local time.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<Bar>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => {
                return Err(DataError::NoQualifyingInstrument {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        // Yahoo omits timestamps entirely when the range holds no bars.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp: NaiveDateTime = DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Placeholder rows (halts, the still-forming bar) carry no prices.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0.0),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        let symbol = request.symbol.as_str();
        let url = Self::chart_url(request)?;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                if request.timeout.is_some_and(|t| delay >= t) {
                    break;
                }
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let mut call = self.client.get(&url);
            if let Some(timeout) = request.timeout {
                call = call.timeout(timeout);
            }
            debug!(symbol, attempt, "yahoo chart request");

            match call.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban: immediately trip the circuit breaker
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        self.circuit_breaker.record_failure();
                        return Err(DataError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        // The provider answered; only the symbol is unknown.
                        self.circuit_breaker.record_success();
                        return Err(DataError::NoQualifyingInstrument {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::NetworkUnreachable(format!(
                            "HTTP {status} for {symbol}"
                        )));
                        continue;
                    }

                    self.circuit_breaker.record_success();
                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    return Self::parse_response(symbol, chart);
                }
                Err(e) if e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::Timeout(
                        request.timeout.unwrap_or(Duration::from_secs(30)),
                    ));
                }
                Err(e) if e.is_connect() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        self.fetch_with_retry(request)
    }
}
