//! Concurrent fetching of analysis snapshots and histories for a selection
//!
//! Every request is its own future and its error is captured in place, so a
//! failing ticker never takes the others down with it. Results are keyed by
//! ticker; callers never depend on arrival order.

use crate::api::{CachingClient, HistoryClient, QuoteClient};
use crate::model::{AnalysisSnapshot, DAILY_INTERVAL, HistoryRange, HistorySeries};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, Stream};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle of one request's result
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    /// Requested, nothing usable yet
    Loading,
    /// Immutable result, shared by reference
    Ready(Arc<T>),
    /// Provider failure, kept as a message for display and logs
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Both results for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFetch {
    pub ticker: String,
    pub analysis: FetchState<AnalysisSnapshot>,
    pub history: FetchState<HistorySeries>,
}

/// What a ticket asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Analysis,
    History(HistoryRange),
}

/// A request tagged with the generation it was issued under.
///
/// Whoever issued the ticket compares the generation at resolution time and
/// drops results that have been superseded in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub ticker: String,
    pub kind: RequestKind,
    pub generation: u64,
}

/// Result of a ticket
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Analysis(FetchState<AnalysisSnapshot>),
    History(FetchState<HistorySeries>),
}

/// A resolved ticket
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

/// Issues the per-ticker requests of a comparison
#[derive(Clone)]
pub struct FetchOrchestrator {
    quotes: Arc<dyn QuoteClient>,
    history: Arc<dyn HistoryClient>,
    interval: String,
    cache: Option<Arc<CachingClient>>,
}

impl FetchOrchestrator {
    /// Create an orchestrator requesting daily bars
    pub fn new(quotes: Arc<dyn QuoteClient>, history: Arc<dyn HistoryClient>) -> Self {
        Self {
            quotes,
            history,
            interval: DAILY_INTERVAL.to_string(),
            cache: None,
        }
    }

    /// Cache that [`invalidate`](Self::invalidate) clears entries from.
    /// Normally the same [`CachingClient`] the requests go through.
    pub fn with_cache(mut self, cache: Arc<CachingClient>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a different bar interval for history requests
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    /// Make the next requests for `ticker` bypass cached results.
    /// Does nothing without a cache.
    pub async fn invalidate(&self, ticker: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_ticker(ticker, &self.interval).await;
        }
    }

    pub async fn fetch_analysis(&self, ticker: &str) -> FetchState<AnalysisSnapshot> {
        match self.quotes.get_analysis(ticker).await {
            Ok(snapshot) => FetchState::Ready(Arc::new(snapshot)),
            Err(e) => {
                warn!(ticker, error = %e, "analysis fetch failed");
                FetchState::Failed(e.to_string())
            }
        }
    }

    pub async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> FetchState<HistorySeries> {
        match self.history.get_history(ticker, range, &self.interval).await {
            Ok(series) => FetchState::Ready(Arc::new(series)),
            Err(e) => {
                warn!(ticker, %range, error = %e, "history fetch failed");
                FetchState::Failed(e.to_string())
            }
        }
    }

    /// Fetch everything for `tickers` at once and return the results in the
    /// order of `tickers`. Never fails as a whole.
    pub async fn fetch_all(&self, tickers: &[String], range: HistoryRange) -> Vec<TickerFetch> {
        info!(count = tickers.len(), %range, "fetching comparison data");

        join_all(tickers.iter().map(|ticker| async move {
            let (analysis, history) = tokio::join!(
                self.fetch_analysis(ticker),
                self.fetch_history(ticker, range),
            );
            TickerFetch {
                ticker: ticker.clone(),
                analysis,
                history,
            }
        }))
        .await
    }

    /// Resolve tickets concurrently, yielding each completion as it arrives
    pub fn fetch_tickets(&self, tickets: Vec<Ticket>) -> impl Stream<Item = Completion> + '_ {
        tickets
            .into_iter()
            .map(|ticket| async move {
                let outcome = match ticket.kind {
                    RequestKind::Analysis => {
                        Outcome::Analysis(self.fetch_analysis(&ticket.ticker).await)
                    }
                    RequestKind::History(range) => {
                        Outcome::History(self.fetch_history(&ticket.ticker, range).await)
                    }
                };
                Completion { ticket, outcome }
            })
            .collect::<FuturesUnordered<_>>()
    }
}
