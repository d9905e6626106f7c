//! Comparison grid: a fixed list of metrics projected over the selected snapshots

use crate::model::AnalysisSnapshot;
use serde::Serialize;

/// Rendered for anything missing, non-numeric or non-finite
pub const PLACEHOLDER: &str = "—";

const MEGA: f64 = 1e6;
const GIGA: f64 = 1e9;

/// Raw value read from a snapshot before formatting
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(Option<f64>),
    Text(Option<String>),
}

impl MetricValue {
    fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.filter(|v| v.is_finite()),
            Self::Text(_) => None,
        }
    }
}

/// How a metric is turned into display text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Amount in the snapshot's currency, optionally with `M`/`B` suffixes
    Currency { compact: bool },
    /// Value that already is a percentage
    Percent { signed: bool },
    /// Percentage that may arrive as a fraction, see [`percent_from_decimal`]
    PercentFromDecimal { signed: bool },
    /// Plain number with two decimals
    Decimal,
    /// Passed through untouched
    Text,
}

/// Colouring hint for sign-sensitive rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

/// One row definition of the grid
pub struct MetricSpec {
    pub label: &'static str,
    pub extract: fn(&AnalysisSnapshot) -> MetricValue,
    pub format: ValueFormat,
    pub sign_sensitive: bool,
}

impl MetricSpec {
    /// Render this metric for one column; `None` means no snapshot is available
    pub fn render(&self, snapshot: Option<&AnalysisSnapshot>) -> Cell {
        let Some(snapshot) = snapshot else {
            return Cell {
                text: PLACEHOLDER.to_string(),
                tone: self.sign_sensitive.then_some(Tone::Neutral),
            };
        };

        let value = (self.extract)(snapshot);
        let currency = snapshot.quote.currency.as_deref();
        Cell {
            text: format_value(&value, self.format, currency),
            tone: self
                .sign_sensitive
                .then(|| tone_of(value.number().map(|n| displayed(self.format, n)))),
        }
    }
}

/// Grid rows, in display order
pub static METRICS: [MetricSpec; 12] = [
    MetricSpec {
        label: "Price",
        extract: |s| MetricValue::Number(s.quote.price),
        format: ValueFormat::Currency { compact: false },
        sign_sensitive: false,
    },
    MetricSpec {
        label: "Change (1D)",
        extract: |s| MetricValue::Number(s.quote.change_percent),
        format: ValueFormat::Percent { signed: true },
        sign_sensitive: true,
    },
    MetricSpec {
        label: "Return 3M",
        extract: |s| MetricValue::Number(s.metrics.return_3m),
        format: ValueFormat::PercentFromDecimal { signed: true },
        sign_sensitive: true,
    },
    MetricSpec {
        label: "Return 12M",
        extract: |s| MetricValue::Number(s.metrics.return_12m),
        format: ValueFormat::PercentFromDecimal { signed: true },
        sign_sensitive: true,
    },
    MetricSpec {
        label: "Volatility",
        extract: |s| MetricValue::Number(s.metrics.volatility),
        format: ValueFormat::PercentFromDecimal { signed: false },
        sign_sensitive: false,
    },
    MetricSpec {
        label: "Market Cap",
        extract: |s| MetricValue::Number(s.fundamentals.market_cap),
        format: ValueFormat::Currency { compact: true },
        sign_sensitive: false,
    },
    MetricSpec {
        label: "P/E",
        extract: |s| MetricValue::Number(s.fundamentals.pe_ratio),
        format: ValueFormat::Decimal,
        sign_sensitive: false,
    },
    MetricSpec {
        label: "P/B",
        extract: |s| MetricValue::Number(s.fundamentals.pb_ratio),
        format: ValueFormat::Decimal,
        sign_sensitive: false,
    },
    MetricSpec {
        label: "Dividend Yield",
        extract: |s| MetricValue::Number(s.fundamentals.dividend_yield),
        format: ValueFormat::PercentFromDecimal { signed: false },
        sign_sensitive: false,
    },
    MetricSpec {
        label: "ROE",
        extract: |s| MetricValue::Number(s.fundamentals.roe),
        format: ValueFormat::PercentFromDecimal { signed: false },
        sign_sensitive: false,
    },
    MetricSpec {
        label: "Debt/Equity",
        extract: |s| MetricValue::Number(s.fundamentals.debt_to_equity),
        format: ValueFormat::Decimal,
        sign_sensitive: false,
    },
    MetricSpec {
        label: "Risk",
        extract: |s| MetricValue::Text(s.risk_level.clone()),
        format: ValueFormat::Text,
        sign_sensitive: false,
    },
];

/// One formatted value of the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

/// One line of the comparison grid, a cell per selected ticker in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub label: &'static str,
    pub cells: Vec<Cell>,
    pub sign_sensitive: bool,
}

/// Project every metric over the given columns.
///
/// Columns without a snapshot (still loading, or failed) get placeholders.
pub fn build_rows(columns: &[Option<&AnalysisSnapshot>]) -> Vec<ComparisonRow> {
    METRICS
        .iter()
        .map(|metric| ComparisonRow {
            label: metric.label,
            cells: columns.iter().map(|snapshot| metric.render(*snapshot)).collect(),
            sign_sensitive: metric.sign_sensitive,
        })
        .collect()
}

/// Format a raw metric, never failing
pub fn format_value(value: &MetricValue, format: ValueFormat, currency: Option<&str>) -> String {
    match (format, value.number()) {
        (ValueFormat::Text, _) => match value {
            MetricValue::Text(Some(text)) if !text.trim().is_empty() => text.clone(),
            MetricValue::Number(Some(n)) if n.is_finite() => n.to_string(),
            _ => PLACEHOLDER.to_string(),
        },
        (_, None) => PLACEHOLDER.to_string(),
        (ValueFormat::Currency { compact }, Some(n)) => format_currency(n, currency, compact),
        (ValueFormat::Percent { signed }, Some(n)) => format_percent(n, signed),
        (ValueFormat::PercentFromDecimal { signed }, Some(n)) => {
            format_percent(percent_from_decimal(n), signed)
        }
        (ValueFormat::Decimal, Some(n)) => format!("{:.2}", round_cents(n)),
    }
}

/// Magnitudes above 1 are taken as percentages already; anything else is a
/// fraction and gets scaled by 100.
pub fn percent_from_decimal(value: f64) -> f64 {
    if value.abs() > 1.0 { value } else { value * 100.0 }
}

fn currency_symbol(code: Option<&str>) -> String {
    match code.map(str::trim) {
        None | Some("") => String::new(),
        Some(code) if code.eq_ignore_ascii_case("EUR") => "€".to_string(),
        Some(code) if code.eq_ignore_ascii_case("USD") => "$".to_string(),
        Some(code) => format!("{} ", code.to_uppercase()),
    }
}

/// Round to the two decimals every numeric cell shows, folding `-0.00` into zero
fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// The number a cell ends up showing, which is also what its tone follows
fn displayed(format: ValueFormat, value: f64) -> f64 {
    match format {
        ValueFormat::PercentFromDecimal { .. } => round_cents(percent_from_decimal(value)),
        _ => round_cents(value),
    }
}

fn format_currency(value: f64, currency: Option<&str>, compact: bool) -> String {
    let value = if compact && value.abs() >= MEGA { value } else { round_cents(value) };
    let symbol = currency_symbol(currency);
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    let body = if compact && magnitude >= GIGA {
        format!("{:.2}B", magnitude / GIGA)
    } else if compact && magnitude >= MEGA {
        format!("{:.2}M", magnitude / MEGA)
    } else {
        format!("{magnitude:.2}")
    };
    format!("{sign}{symbol}{body}")
}

fn format_percent(value: f64, signed: bool) -> String {
    let value = round_cents(value);
    if signed && value > 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}

fn tone_of(value: Option<f64>) -> Tone {
    match value {
        Some(v) if v > 0.0 => Tone::Positive,
        Some(v) if v < 0.0 => Tone::Negative,
        _ => Tone::Neutral,
    }
}
