//! Bounded set of instruments chosen for side-by-side comparison

use crate::model::normalize_ticker;
use serde::{Deserialize, Serialize};

/// Maximum number of instruments compared at once
pub const MAX_SELECTION: usize = 4;

/// Ordered, duplicate-free list of at most [`MAX_SELECTION`] tickers.
///
/// Boundary violations (duplicates, a fifth ticker, removing something that
/// is not there) are ignored rather than reported. The boolean returned by
/// the mutators says whether anything changed, which is what callers use to
/// decide whether cached results need to be thrown away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    tickers: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ticker: &str) -> bool {
        let Some(ticker) = normalize_ticker(ticker) else {
            return false;
        };
        if self.tickers.len() >= MAX_SELECTION || self.tickers.contains(&ticker) {
            return false;
        }
        self.tickers.push(ticker);
        true
    }

    pub fn remove(&mut self, ticker: &str) -> bool {
        let Some(ticker) = normalize_ticker(ticker) else {
            return false;
        };
        let before = self.tickers.len();
        self.tickers.retain(|t| *t != ticker);
        self.tickers.len() != before
    }

    pub fn contains(&self, ticker: &str) -> bool {
        normalize_ticker(ticker).is_some_and(|t| self.tickers.contains(&t))
    }

    /// Empty the set, returning what was selected
    pub fn clear(&mut self) -> Vec<String> {
        std::mem::take(&mut self.tickers)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tickers.len() >= MAX_SELECTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> SelectionSet {
        let mut set = SelectionSet::new();
        for ticker in ["NDA", "NOKIA", "SAMPO", "KNEBV"] {
            assert!(set.add(ticker));
        }
        set
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = SelectionSet::new();
        assert!(set.add("NDA"));
        let snapshot = set.clone();
        assert!(!set.add("NDA"));
        assert!(!set.add(" nda "));
        assert_eq!(set, snapshot);
    }

    #[test]
    fn test_fifth_ticker_is_ignored() {
        let mut set = full();
        let before = set.clone();
        assert!(!set.add("FORTUM"));
        assert_eq!(set.len(), MAX_SELECTION);
        assert_eq!(set, before);
        assert!(set.is_full());
    }

    #[test]
    fn test_remove_and_contains() {
        let mut set = full();
        assert!(set.contains("nokia"));
        assert!(set.remove("NOKIA"));
        assert!(!set.contains("NOKIA"));
        assert!(!set.remove("NOKIA"));
        assert_eq!(set.tickers(), ["NDA", "SAMPO", "KNEBV"]);

        // Freed slot can be reused.
        assert!(set.add("FORTUM"));
        assert_eq!(set.tickers().last().map(String::as_str), Some("FORTUM"));
    }

    #[test]
    fn test_blank_tickers_are_ignored() {
        let mut set = SelectionSet::new();
        assert!(!set.add("  "));
        assert!(!set.remove(""));
        assert!(!set.contains(""));
        assert!(set.is_empty());
    }

    #[test]
    fn test_clear_returns_previous_selection() {
        let mut set = full();
        let removed = set.clear();
        assert_eq!(removed.len(), MAX_SELECTION);
        assert!(set.is_empty());
    }
}
