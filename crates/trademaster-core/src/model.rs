//! Domain types shared by clients, the orchestrator and the views
//!
//! Numeric fields coming from the backend are parsed leniently: a JSON number,
//! a numeric string, `null`, a missing key or garbage all deserialize without
//! error. Anything that is not a number ends up as `None`, which the projection
//! table later renders as a placeholder.

use crate::error::{Result, StockError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable instrument as listed by the universe directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub sector: String,
}

impl Instrument {
    pub fn new(
        ticker: impl Into<String>,
        name: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            sector: sector.into(),
        }
    }
}

/// Canonical form of a user-supplied ticker, `None` when blank
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim();
    if ticker.is_empty() {
        None
    } else {
        Some(ticker.to_uppercase())
    }
}

/// Latest price information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, alias = "changePercent", deserialize_with = "lenient_f64")]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Trailing return metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    #[serde(default, alias = "return3m", deserialize_with = "lenient_f64")]
    pub return_3m: Option<f64>,
    #[serde(default, alias = "return12m", deserialize_with = "lenient_f64")]
    pub return_12m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volatility: Option<f64>,
}

/// Valuation and balance-sheet ratios
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(default, alias = "marketCap", deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, alias = "peRatio", deserialize_with = "lenient_f64")]
    pub pe_ratio: Option<f64>,
    #[serde(default, alias = "pbRatio", deserialize_with = "lenient_f64")]
    pub pb_ratio: Option<f64>,
    #[serde(default, alias = "dividendYield", deserialize_with = "lenient_f64")]
    pub dividend_yield: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub roe: Option<f64>,
    #[serde(default, alias = "debtToEquity", deserialize_with = "lenient_f64")]
    pub debt_to_equity: Option<f64>,
}

/// Everything the comparison grid knows about one instrument.
///
/// Produced by a single fetch and never patched afterwards; a newer fetch
/// replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quote: QuoteData,
    #[serde(default)]
    pub metrics: ReturnMetrics,
    #[serde(default)]
    pub fundamentals: Fundamentals,
    #[serde(default, alias = "riskLevel", deserialize_with = "lenient_string")]
    pub risk_level: Option<String>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl AnalysisSnapshot {
    /// Empty snapshot for a ticker, mostly useful in tests and fixtures
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: None,
            quote: QuoteData::default(),
            metrics: ReturnMetrics::default(),
            fundamentals: Fundamentals::default(),
            risk_level: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Chart horizon offered by the comparison view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl HistoryRange {
    pub const ALL: [HistoryRange; 3] = [Self::ThreeMonths, Self::SixMonths, Self::OneYear];

    /// Wire value understood by the backend and Yahoo
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
        }
    }

    /// Approximate calendar span, for providers that need explicit dates
    pub fn days(&self) -> i64 {
        match self {
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3mo" | "3m" => Ok(Self::ThreeMonths),
            "6mo" | "6m" => Ok(Self::SixMonths),
            "1y" | "12mo" => Ok(Self::OneYear),
            other => Err(StockError::InvalidRange(other.to_string())),
        }
    }
}

/// Daily bar interval, the only one the comparison chart uses
pub const DAILY_INTERVAL: &str = "1d";

/// One raw sample of a price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub close: Option<f64>,
}

impl HistoryPoint {
    pub fn new(date: impl Into<String>, close: Option<f64>) -> Self {
        Self {
            date: date.into(),
            close,
        }
    }
}

/// Price history for one (ticker, range, interval) request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    pub ticker: String,
    pub range: HistoryRange,
    pub interval: String,
    pub points: Vec<HistoryPoint>,
}

impl HistorySeries {
    pub fn new(ticker: impl Into<String>, range: HistoryRange, points: Vec<HistoryPoint>) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            interval: DAILY_INTERVAL.to_string(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Accept numbers, numeric strings and anything else as `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Best-effort numeric reading of a JSON value
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
}
