//! TradeMaster REST backend client

use crate::api::{HistoryClient, QuoteClient, UniverseClient};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::model::{AnalysisSnapshot, HistoryPoint, HistoryRange, HistorySeries, Instrument};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use url::Url;

const PROVIDER: &str = "TradeMaster backend";
const MAX_ERROR_BODY: usize = 200;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Client for the `/api/stocks` endpoints of the TradeMaster backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    rate_limiter: SharedRateLimiter,
    retry: RetryPolicy,
}

impl BackendClient {
    /// Create a client from configuration
    pub fn new(config: &StockConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(StockError::ConfigError(format!(
                "backend URL cannot be a base: {base_url}"
            )));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;

        let quota = Quota::per_minute(
            NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN),
        );

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Build `{base}/api/stocks/{segments...}`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StockError::ConfigError("backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "stocks"])
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, operation: &str, url: Url, subject: &str) -> Result<Value> {
        self.retry
            .execute(operation, || {
                let url = url.clone();
                async move {
                    self.rate_limiter.until_ready().await;
                    tracing::debug!(%url, "backend request");

                    let mut request = self.client.get(url);
                    if let Some(token) = &self.api_token {
                        request = request.bearer_auth(token);
                    }

                    let response = request.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(status_error(status, &body, subject));
                    }
                    Ok(response.json::<Value>().await?)
                }
            })
            .await
    }
}

#[async_trait]
impl UniverseClient for BackendClient {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let url = self.endpoint(&[])?;
        let body = self.get_json("list_instruments", url, "universe").await?;
        parse_instruments(body)
    }
}

#[async_trait]
impl QuoteClient for BackendClient {
    async fn get_analysis(&self, ticker: &str) -> Result<AnalysisSnapshot> {
        let url = self.endpoint(&[ticker, "analysis"])?;
        let body = self.get_json("get_analysis", url, ticker).await?;
        parse_analysis(ticker, body)
    }
}

#[async_trait]
impl HistoryClient for BackendClient {
    async fn get_history(
        &self,
        ticker: &str,
        range: HistoryRange,
        interval: &str,
    ) -> Result<HistorySeries> {
        let mut url = self.endpoint(&[ticker, "history"])?;
        url.query_pairs_mut()
            .append_pair("range", range.as_str())
            .append_pair("interval", interval);
        let body = self.get_json("get_history", url, ticker).await?;
        parse_history(ticker, range, interval, body)
    }
}

fn status_error(status: StatusCode, body: &str, subject: &str) -> StockError {
    match status {
        StatusCode::NOT_FOUND => StockError::DataUnavailable {
            symbol: subject.to_string(),
            reason: "not found".to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => StockError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        },
        _ => StockError::ApiError {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        },
    }
}

/// Accepts either a bare array or an object wrapping it under `stocks`/`data`
fn unwrap_list(body: Value, keys: &[&str]) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => keys.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

pub(crate) fn parse_instruments(body: Value) -> Result<Vec<Instrument>> {
    let items = unwrap_list(body, &["stocks", "data", "instruments"]).ok_or_else(|| {
        StockError::Other("instrument list response is not a list".to_string())
    })?;

    // Entries without a ticker are unusable for selection; skip instead of failing the list.
    Ok(items
        .into_iter()
        .filter_map(|item| {
            let ticker = item.get("ticker").or_else(|| item.get("symbol"))?.as_str()?;
            let name = item.get("name").and_then(Value::as_str).unwrap_or(ticker);
            let sector = item.get("sector").and_then(Value::as_str).unwrap_or_default();
            Some(Instrument::new(ticker, name, sector))
        })
        .collect())
}

pub(crate) fn parse_analysis(ticker: &str, mut body: Value) -> Result<AnalysisSnapshot> {
    let Some(map) = body.as_object_mut() else {
        return Err(StockError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: "analysis response is not an object".to_string(),
        });
    };
    if !map.get("ticker").is_some_and(Value::is_string) {
        map.insert("ticker".to_string(), Value::String(ticker.to_string()));
    }
    Ok(serde_json::from_value(body)?)
}

pub(crate) fn parse_history(
    ticker: &str,
    range: HistoryRange,
    interval: &str,
    body: Value,
) -> Result<HistorySeries> {
    let items = unwrap_list(body, &["data", "history", "prices"]).ok_or_else(|| {
        StockError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: "history response is not a list".to_string(),
        }
    })?;

    let points = items
        .into_iter()
        .filter_map(|item| {
            let date = item.get("date").and_then(Value::as_str)?;
            // Timestamps collapse to their calendar date so tickers line up per day.
            let date = date.split('T').next().unwrap_or(date);
            let close = item.get("close").and_then(crate::model::value_as_f64);
            Some(HistoryPoint::new(date, close))
        })
        .collect();

    Ok(HistorySeries {
        ticker: ticker.to_string(),
        range,
        interval: interval.to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> BackendClient {
        let config = StockConfig::builder().api_base_url(base).build().unwrap();
        BackendClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let client = client("https://trademaster.example/");
        assert_eq!(
            client.endpoint(&["NDA-FI.HE", "analysis"]).unwrap().as_str(),
            "https://trademaster.example/api/stocks/NDA-FI.HE/analysis"
        );
        assert_eq!(
            client.endpoint(&[]).unwrap().as_str(),
            "https://trademaster.example/api/stocks"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes() {
        let client = client("https://host.example/prefix");
        assert_eq!(
            client.endpoint(&["A B", "history"]).unwrap().as_str(),
            "https://host.example/prefix/api/stocks/A%20B/history"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let config = StockConfig {
            api_base_url: "mailto:ops@example.com".to_string(),
            ..StockConfig::default()
        };
        assert!(matches!(
            BackendClient::new(&config),
            Err(StockError::ConfigError(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "NOKIA"),
            StockError::DataUnavailable { symbol, .. } if symbol == "NOKIA"
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "NOKIA"),
            StockError::RateLimitExceeded { .. }
        ));
        let long_body = "x".repeat(1000);
        match status_error(StatusCode::BAD_GATEWAY, &long_body, "NOKIA") {
            StockError::ApiError { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_instruments_wrapped_and_bare() {
        let wrapped = json!({ "stocks": [
            { "ticker": "NDA-FI.HE", "name": "Nordea Bank", "sector": "Financials" },
            { "symbol": "NOKIA.HE", "name": "Nokia" },
            { "name": "no ticker" }
        ]});
        let instruments = parse_instruments(wrapped).unwrap();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].sector, "Financials");
        assert_eq!(instruments[1].ticker, "NOKIA.HE");
        assert_eq!(instruments[1].sector, "");

        let bare = json!([{ "ticker": "AAPL" }]);
        let instruments = parse_instruments(bare).unwrap();
        assert_eq!(instruments[0].name, "AAPL");

        assert!(parse_instruments(json!("nope")).is_err());
    }

    #[test]
    fn test_parse_analysis_fills_missing_ticker() {
        let snapshot = parse_analysis(
            "NOKIA.HE",
            json!({ "quote": { "price": 3.71, "currency": "EUR" }, "risk_level": "low" }),
        )
        .unwrap();
        assert_eq!(snapshot.ticker, "NOKIA.HE");
        assert_eq!(snapshot.quote.price, Some(3.71));

        assert!(parse_analysis("NOKIA.HE", json!([1, 2])).is_err());
    }

    #[test]
    fn test_parse_history() {
        let body = json!({ "ticker": "NDA", "data": [
            { "date": "2024-03-01T00:00:00Z", "close": 10.0 },
            { "date": "2024-03-04", "close": "10.5" },
            { "date": "2024-03-05", "close": null },
            { "close": 11.0 }
        ]});
        let series = parse_history("NDA", HistoryRange::ThreeMonths, "1d", body).unwrap();
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[0], HistoryPoint::new("2024-03-01", Some(10.0)));
        assert_eq!(series.points[1].close, Some(10.5));
        assert_eq!(series.points[2].close, None);
        assert_eq!(series.range, HistoryRange::ThreeMonths);
    }

    #[tokio::test]
    #[ignore] // Requires a running backend
    async fn test_live_list_instruments() {
        let config = StockConfig::builder().with_env().unwrap().build().unwrap();
        let client = BackendClient::new(&config).unwrap();
        let instruments = client.list_instruments().await.unwrap();
        assert!(!instruments.is_empty());
    }
}
