//! Directory of selectable instruments, used for search and autocomplete

use crate::api::UniverseClient;
use crate::error::Result;
use crate::model::{Instrument, normalize_ticker};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Loads the instrument list once and answers lookups from memory
pub struct UniverseDirectory {
    client: Option<Arc<dyn UniverseClient>>,
    instruments: OnceCell<Vec<Instrument>>,
}

impl UniverseDirectory {
    pub fn new(client: Arc<dyn UniverseClient>) -> Self {
        Self {
            client: Some(client),
            instruments: OnceCell::new(),
        }
    }

    /// Directory over a fixed list, without any client round trip
    pub fn from_instruments(instruments: Vec<Instrument>) -> Self {
        Self {
            client: None,
            instruments: OnceCell::new_with(Some(instruments)),
        }
    }

    /// All instruments, fetching them on first use.
    ///
    /// A failed load is not remembered; the next call tries again.
    pub async fn instruments(&self) -> Result<&[Instrument]> {
        let instruments = self
            .instruments
            .get_or_try_init(|| async {
                let Some(client) = &self.client else {
                    return Ok(Vec::new());
                };
                let instruments = client.list_instruments().await?;
                tracing::info!(count = instruments.len(), "instrument universe loaded");
                Ok::<_, crate::error::StockError>(instruments)
            })
            .await?;
        Ok(instruments)
    }

    pub async fn get(&self, ticker: &str) -> Result<Option<Instrument>> {
        let Some(ticker) = normalize_ticker(ticker) else {
            return Ok(None);
        };
        Ok(self
            .instruments()
            .await?
            .iter()
            .find(|i| i.ticker.eq_ignore_ascii_case(&ticker))
            .cloned())
    }

    /// Distinct sector labels, sorted
    pub async fn sectors(&self) -> Result<Vec<String>> {
        let sectors: BTreeSet<&str> = self
            .instruments()
            .await?
            .iter()
            .map(|i| i.sector.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(sectors.into_iter().map(str::to_string).collect())
    }

    /// Autocomplete lookup.
    ///
    /// Exact ticker matches come first, then ticker prefixes, then tickers,
    /// names or sectors containing the query. Ties keep directory order.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Instrument>> {
        let instruments = self.instruments().await?;
        Ok(rank(instruments, query, limit))
    }
}

fn rank(instruments: &[Instrument], query: &str, limit: usize) -> Vec<Instrument> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return instruments.iter().take(limit).cloned().collect();
    }

    let mut scored: Vec<(u8, usize, &Instrument)> = instruments
        .iter()
        .enumerate()
        .filter_map(|(position, instrument)| {
            let ticker = instrument.ticker.to_lowercase();
            let score = if ticker == needle {
                0
            } else if ticker.starts_with(&needle) {
                1
            } else if ticker.contains(&needle) || instrument.name.to_lowercase().contains(&needle)
            {
                2
            } else if instrument.sector.to_lowercase().contains(&needle) {
                3
            } else {
                return None;
            };
            Some((score, position, instrument))
        })
        .collect();

    scored.sort_by_key(|(score, position, _)| (*score, *position));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, _, instrument)| instrument.clone())
        .collect()
}
