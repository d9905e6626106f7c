//! Read-only market-data collaborators
//!
//! The comparison flow only ever talks to three operations. Each one is a
//! trait so the backend client, the Yahoo client, the caching decorator and
//! test doubles can be swapped freely.

pub mod backend;
pub mod caching;
pub mod yahoo;

use crate::error::Result;
use crate::model::{AnalysisSnapshot, HistoryRange, HistorySeries, Instrument};
use async_trait::async_trait;

pub use backend::BackendClient;
pub use caching::CachingClient;
pub use yahoo::YahooFinanceClient;

/// Lists every selectable instrument
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UniverseClient: Send + Sync {
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;
}

/// Latest quote, returns and fundamentals for one instrument
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteClient: Send + Sync {
    async fn get_analysis(&self, ticker: &str) -> Result<AnalysisSnapshot>;
}

/// Close-price history for one instrument
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryClient: Send + Sync {
    async fn get_history(
        &self,
        ticker: &str,
        range: HistoryRange,
        interval: &str,
    ) -> Result<HistorySeries>;
}
