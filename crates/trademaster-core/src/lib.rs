//! Instrument comparison for TradeMaster
//!
//! This crate backs the side-by-side comparison view. It includes:
//!
//! - A bounded selection of up to four instruments
//! - Concurrent fetching of analysis snapshots and price histories, with
//!   per-request failure capture and stale-result rejection
//! - Rebasing of histories to a common index of 100 for the overlay chart
//! - A fixed twelve-metric comparison grid with display formatting
//! - A searchable directory of the instrument universe
//! - REST and Yahoo Finance clients behind a TTL caching decorator
//!
//! # Example
//!
//! ```rust,ignore
//! use trademaster_core::{ComparisonSession, StockConfig, build_clients};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfig::builder().with_env()?.build()?;
//!     let clients = build_clients(&config)?;
//!
//!     let mut session = ComparisonSession::new();
//!     session.add("NDA-FI.HE");
//!     session.add("NOKIA.HE");
//!     session.refresh(&clients.orchestrator).await;
//!
//!     for row in session.comparison_rows() {
//!         println!("{}: {:?}", row.label, row.cells);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod projection;
pub mod retry;
pub mod selection;
pub mod session;
pub mod universe;

use std::sync::Arc;

// Re-export main types for convenience
pub use api::{
    BackendClient, CachingClient, HistoryClient, QuoteClient, UniverseClient, YahooFinanceClient,
};
pub use cache::CacheManager;
pub use config::{HistoryProvider, StockConfig};
pub use error::{Result, StockError};
pub use model::{AnalysisSnapshot, HistoryRange, HistorySeries, Instrument};
pub use normalize::{ChartRow, merge_normalized, normalize_series};
pub use orchestrator::{FetchOrchestrator, FetchState, TickerFetch};
pub use projection::{ComparisonRow, METRICS, PLACEHOLDER, build_rows};
pub use selection::{MAX_SELECTION, SelectionSet};
pub use session::ComparisonSession;
pub use universe::UniverseDirectory;

/// Everything the comparison view needs, wired from one configuration
#[derive(Clone)]
pub struct ComparisonClients {
    pub orchestrator: FetchOrchestrator,
    pub universe: Arc<dyn UniverseClient>,
    pub caching: Arc<CachingClient>,
}

impl ComparisonClients {
    pub fn directory(&self) -> UniverseDirectory {
        UniverseDirectory::new(self.universe.clone())
    }
}

/// Build the cached client stack described by `config`.
///
/// Analysis and the universe always come from the backend. History comes from
/// the backend or straight from Yahoo Finance depending on
/// [`StockConfig::history_provider`].
pub fn build_clients(config: &StockConfig) -> Result<ComparisonClients> {
    config.validate()?;

    let backend = Arc::new(BackendClient::new(config)?);
    let history: Arc<dyn HistoryClient> = match config.history_provider {
        HistoryProvider::Backend => backend.clone(),
        HistoryProvider::Yahoo => Arc::new(YahooFinanceClient::new()),
    };
    tracing::debug!(
        base_url = %config.api_base_url,
        provider = ?config.history_provider,
        "building comparison clients"
    );

    let caching = Arc::new(CachingClient::new(
        backend.clone(),
        backend,
        history,
        CacheManager::from_config(config),
    ));
    let orchestrator = FetchOrchestrator::new(caching.clone(), caching.clone())
        .with_interval(config.history_interval.clone())
        .with_cache(caching.clone());

    Ok(ComparisonClients {
        orchestrator,
        universe: caching.clone(),
        caching,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_clients_uses_configured_interval() {
        let config = StockConfig::builder()
            .api_base_url("http://localhost:9000")
            .history_interval("1wk")
            .build()
            .unwrap();
        let clients = build_clients(&config).unwrap();
        assert_eq!(clients.orchestrator.interval(), "1wk");
        assert!(clients.caching.caches().analysis.is_empty().await);
    }

    #[test]
    fn test_build_clients_rejects_bad_url() {
        let mut config = StockConfig::default();
        config.api_base_url = "not a url".to_string();
        assert!(build_clients(&config).is_err());
    }
}
