//! Yahoo Finance history client

use crate::api::HistoryClient;
use crate::error::{Result, StockError};
use crate::model::{DAILY_INTERVAL, HistoryPoint, HistoryRange, HistorySeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

/// Reads daily close prices straight from Yahoo Finance
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new() -> Self {
        Self {}
    }

    /// Daily closes between `start` and `end`
    pub async fn daily_closes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp()).map_err(|e| {
            StockError::YahooFinanceError(format!("Invalid start timestamp: {e}"))
        })?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?;
                Some(HistoryPoint::new(date_key(date), Some(q.close)))
            })
            .collect())
    }
}

/// Calendar date used to align samples across tickers
fn date_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl HistoryClient for YahooFinanceClient {
    async fn get_history(
        &self,
        ticker: &str,
        range: HistoryRange,
        interval: &str,
    ) -> Result<HistorySeries> {
        if interval != DAILY_INTERVAL {
            return Err(StockError::YahooFinanceError(format!(
                "unsupported interval {interval}, only {DAILY_INTERVAL} is available"
            )));
        }

        let end = Utc::now();
        let start = end - chrono::Duration::days(range.days());
        let points = self.daily_closes(ticker, start, end).await?;
        Ok(HistorySeries::new(ticker, range, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key() {
        let ts = DateTime::from_timestamp(1_709_251_200, 0).unwrap(); // 2024-03-01T00:00:00Z
        assert_eq!(date_key(ts), "2024-03-01");
    }

    #[tokio::test]
    async fn test_rejects_intraday_interval() {
        let client = YahooFinanceClient::new();
        let result = client
            .get_history("NOKIA.HE", HistoryRange::ThreeMonths, "1h")
            .await;
        assert!(matches!(result, Err(StockError::YahooFinanceError(_))));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_history() {
        let client = YahooFinanceClient::new();
        let series = client
            .get_history("NOKIA.HE", HistoryRange::ThreeMonths, DAILY_INTERVAL)
            .await
            .unwrap();
        assert!(!series.is_empty());
        assert_eq!(series.ticker, "NOKIA.HE");
    }
}
