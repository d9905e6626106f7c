//! State of one comparison view: the selection, the chart range and the
//! latest accepted result of every request.
//!
//! Each request is issued as a [`Ticket`] carrying a generation number. Adding
//! or removing tickers, switching the range or reloading hands out new
//! generations, so a result that resolves after its slot was superseded is
//! recognised and dropped instead of overwriting newer data.

use crate::model::{AnalysisSnapshot, HistoryRange, HistorySeries, normalize_ticker};
use crate::normalize::{ChartRow, merge_normalized};
use crate::orchestrator::{Completion, FetchOrchestrator, FetchState, Outcome, RequestKind, Ticket};
use crate::projection::{ComparisonRow, build_rows};
use crate::selection::SelectionSet;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    state: FetchState<T>,
    requested: bool,
}

impl<T> Slot<T> {
    fn loading(generation: u64) -> Self {
        Self {
            generation,
            state: FetchState::Loading,
            requested: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ComparisonSession {
    selection: SelectionSet,
    range: HistoryRange,
    next_generation: u64,
    analysis: HashMap<String, Slot<AnalysisSnapshot>>,
    history: HashMap<String, Slot<HistorySeries>>,
}

impl ComparisonSession {
    /// Empty session on the default six month range
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(range: HistoryRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    pub fn tickers(&self) -> &[String] {
        self.selection.tickers()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn range(&self) -> HistoryRange {
        self.range
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.selection.contains(ticker)
    }

    /// Add a ticker and mark both of its requests as loading.
    ///
    /// Duplicates, blanks and a fifth ticker are ignored and return `false`.
    pub fn add(&mut self, ticker: &str) -> bool {
        if !self.selection.add(ticker) {
            return false;
        }
        let Some(ticker) = normalize_ticker(ticker) else {
            return false;
        };
        self.reset_analysis(&ticker);
        self.reset_history(&ticker);
        true
    }

    /// Remove a ticker; anything still in flight for it will be discarded
    pub fn remove(&mut self, ticker: &str) -> bool {
        if !self.selection.remove(ticker) {
            return false;
        }
        if let Some(ticker) = normalize_ticker(ticker) {
            self.analysis.remove(&ticker);
            self.history.remove(&ticker);
        }
        true
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        self.analysis.clear();
        self.history.clear();
    }

    /// Switch the chart range. History already loaded for the previous range
    /// is dropped, analysis snapshots are kept.
    pub fn set_range(&mut self, range: HistoryRange) -> bool {
        if range == self.range {
            return false;
        }
        debug!(from = %self.range, to = %range, "chart range changed");
        self.range = range;
        for ticker in self.selection.tickers().to_vec() {
            self.reset_history(&ticker);
        }
        true
    }

    /// Forget every result and request everything again.
    ///
    /// Cached provider responses for the selected tickers are dropped too, so
    /// the next [`refresh`](Self::refresh) reaches the providers.
    pub async fn reload(&mut self, orchestrator: &FetchOrchestrator) {
        info!(count = self.selection.len(), "reloading comparison");
        for ticker in self.selection.tickers().to_vec() {
            orchestrator.invalidate(&ticker).await;
            self.reset_analysis(&ticker);
            self.reset_history(&ticker);
        }
    }

    /// Tickets for every slot that has not been requested yet, in selection
    /// order. Each slot is handed out once per generation.
    pub fn pending_tickets(&mut self) -> Vec<Ticket> {
        let mut tickets = Vec::new();
        for ticker in self.selection.tickers() {
            if let Some(slot) = self.analysis.get_mut(ticker).filter(|s| !s.requested) {
                slot.requested = true;
                tickets.push(Ticket {
                    ticker: ticker.clone(),
                    kind: RequestKind::Analysis,
                    generation: slot.generation,
                });
            }
            if let Some(slot) = self.history.get_mut(ticker).filter(|s| !s.requested) {
                slot.requested = true;
                tickets.push(Ticket {
                    ticker: ticker.clone(),
                    kind: RequestKind::History(self.range),
                    generation: slot.generation,
                });
            }
        }
        tickets
    }

    /// Store a resolved ticket if it is still current. Returns whether the
    /// result was accepted.
    pub fn apply(&mut self, completion: Completion) -> bool {
        let Completion { ticket, outcome } = completion;
        match (ticket.kind, outcome) {
            (RequestKind::Analysis, Outcome::Analysis(state)) => self.apply_analysis(&ticket, state),
            (RequestKind::History(_), Outcome::History(state)) => self.apply_history(&ticket, state),
            (kind, _) => {
                debug!(ticker = %ticket.ticker, ?kind, "discarding mismatched completion");
                false
            }
        }
    }

    /// Store an analysis result if `ticket` is still the current one for its ticker
    pub fn apply_analysis(&mut self, ticket: &Ticket, state: FetchState<AnalysisSnapshot>) -> bool {
        if ticket.kind != RequestKind::Analysis {
            return false;
        }
        accept(self.analysis.get_mut(&ticket.ticker), ticket, state)
    }

    /// Store a history result if `ticket` is still current and asked for the
    /// current range
    pub fn apply_history(&mut self, ticket: &Ticket, state: FetchState<HistorySeries>) -> bool {
        if ticket.kind != RequestKind::History(self.range) {
            debug!(ticker = %ticket.ticker, kind = ?ticket.kind, "discarding history for a previous range");
            return false;
        }
        accept(self.history.get_mut(&ticket.ticker), ticket, state)
    }

    /// Issue every pending request through `orchestrator` and apply the
    /// results as they arrive. Returns how many were accepted.
    pub async fn refresh(&mut self, orchestrator: &FetchOrchestrator) -> usize {
        let tickets = self.pending_tickets();
        if tickets.is_empty() {
            return 0;
        }
        info!(requests = tickets.len(), range = %self.range, "refreshing comparison");

        let mut completions = std::pin::pin!(orchestrator.fetch_tickets(tickets));
        let mut accepted = 0;
        while let Some(completion) = completions.next().await {
            if self.apply(completion) {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn analysis_state(&self, ticker: &str) -> Option<&FetchState<AnalysisSnapshot>> {
        self.analysis.get(ticker).map(|slot| &slot.state)
    }

    pub fn history_state(&self, ticker: &str) -> Option<&FetchState<HistorySeries>> {
        self.history.get(ticker).map(|slot| &slot.state)
    }

    /// Whether any request of the current selection is still outstanding
    pub fn is_loading(&self) -> bool {
        self.analysis.values().any(|slot| slot.state.is_loading())
            || self.history.values().any(|slot| slot.state.is_loading())
    }

    /// Failed requests as `(ticker, message)`, in selection order
    pub fn errors(&self) -> Vec<(&str, &str)> {
        let mut errors = Vec::new();
        for ticker in self.selection.tickers() {
            let analysis = self.analysis_state(ticker).and_then(FetchState::error);
            let history = self.history_state(ticker).and_then(FetchState::error);
            errors.extend(analysis.into_iter().chain(history).map(|e| (ticker.as_str(), e)));
        }
        errors
    }

    /// Comparison grid with one column per selected ticker
    pub fn comparison_rows(&self) -> Vec<ComparisonRow> {
        let columns: Vec<Option<&AnalysisSnapshot>> = self
            .selection
            .tickers()
            .iter()
            .map(|ticker| self.analysis.get(ticker).and_then(|slot| slot.state.ready()))
            .collect();
        build_rows(&columns)
    }

    /// Normalized overlay chart over every history loaded for the current range
    pub fn chart(&self) -> Vec<ChartRow> {
        merge_normalized(
            self.selection
                .tickers()
                .iter()
                .filter_map(|ticker| self.history.get(ticker)?.state.ready())
                .filter(|series| series.range == self.range),
        )
    }

    fn issue(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn reset_analysis(&mut self, ticker: &str) {
        let generation = self.issue();
        self.analysis.insert(ticker.to_string(), Slot::loading(generation));
    }

    fn reset_history(&mut self, ticker: &str) {
        let generation = self.issue();
        self.history.insert(ticker.to_string(), Slot::loading(generation));
    }
}

fn accept<T>(slot: Option<&mut Slot<T>>, ticket: &Ticket, state: FetchState<T>) -> bool {
    match slot {
        Some(slot) if slot.generation == ticket.generation => {
            slot.state = state;
            true
        }
        Some(slot) => {
            debug!(
                ticker = %ticket.ticker,
                stale = ticket.generation,
                current = slot.generation,
                "discarding superseded result"
            );
            false
        }
        None => {
            debug!(ticker = %ticket.ticker, "discarding result for a deselected ticker");
            false
        }
    }
}
