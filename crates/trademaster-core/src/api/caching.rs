//! Caching decorator over the market-data clients

use crate::api::{HistoryClient, QuoteClient, UniverseClient};
use crate::cache::{CacheKey, CacheManager};
use crate::error::{Result, StockError};
use crate::model::{AnalysisSnapshot, HistoryRange, HistorySeries, Instrument};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const UNIVERSE_KEY: &str = "*";

fn analysis_key(ticker: &str) -> CacheKey {
    CacheKey::new(ticker, "analysis", json!({}))
}

fn history_key(ticker: &str, range: HistoryRange, interval: &str) -> CacheKey {
    CacheKey::new(
        ticker,
        "history",
        json!({ "range": range, "interval": interval }),
    )
}

/// Serves repeated requests from [`CacheManager`] instead of the wrapped clients.
///
/// Keys are the exact request parameters: the ticker for analysis, and
/// (ticker, range, interval) for history.
#[derive(Clone)]
pub struct CachingClient {
    universe: Arc<dyn UniverseClient>,
    quotes: Arc<dyn QuoteClient>,
    history: Arc<dyn HistoryClient>,
    caches: CacheManager,
}

impl CachingClient {
    pub fn new(
        universe: Arc<dyn UniverseClient>,
        quotes: Arc<dyn QuoteClient>,
        history: Arc<dyn HistoryClient>,
        caches: CacheManager,
    ) -> Self {
        Self {
            universe,
            quotes,
            history,
            caches,
        }
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    /// Drop the cached analysis and every cached history range of `ticker`
    /// at `interval`, so the next request reaches the provider.
    pub async fn invalidate_ticker(&self, ticker: &str, interval: &str) {
        self.caches.analysis.invalidate(&analysis_key(ticker)).await;
        for range in HistoryRange::ALL {
            self.caches
                .history
                .invalidate(&history_key(ticker, range, interval))
                .await;
        }
        tracing::debug!(ticker, interval, "cache entries invalidated");
    }
}

#[async_trait]
impl UniverseClient for CachingClient {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let key = CacheKey::new(UNIVERSE_KEY, "instruments", json!({}));
        let value = self
            .caches
            .universe
            .get_or_fetch(key, || async {
                let instruments = self.universe.list_instruments().await?;
                Ok::<_, StockError>(serde_json::to_value(instruments)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl QuoteClient for CachingClient {
    async fn get_analysis(&self, ticker: &str) -> Result<AnalysisSnapshot> {
        let key = analysis_key(ticker);
        let value = self
            .caches
            .analysis
            .get_or_fetch(key, || async {
                let snapshot = self.quotes.get_analysis(ticker).await?;
                Ok::<_, StockError>(serde_json::to_value(snapshot)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl HistoryClient for CachingClient {
    async fn get_history(
        &self,
        ticker: &str,
        range: HistoryRange,
        interval: &str,
    ) -> Result<HistorySeries> {
        let key = history_key(ticker, range, interval);
        let value = self
            .caches
            .history
            .get_or_fetch(key, || async {
                let series = self.history.get_history(ticker, range, interval).await?;
                Ok::<_, StockError>(serde_json::to_value(series)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
