//! Rebasing of price histories to a common index for the overlay chart

use crate::model::HistorySeries;
use serde::Serialize;
use std::collections::BTreeMap;

/// Index value of the first sample of every rebased series
pub const INDEX_BASE: f64 = 100.0;

/// One rebased sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub date: String,
    pub value: f64,
}

/// One rebased series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub ticker: String,
    pub points: Vec<NormalizedPoint>,
}

/// One row of the merged chart table: a date and a value per ticker that had
/// a sample on that date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub date: String,
    pub values: BTreeMap<String, f64>,
}

impl ChartRow {
    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.values.get(ticker).copied()
    }
}

/// Rebase one series so that its first sample is [`INDEX_BASE`].
///
/// Returns `None` when the series is empty or its first close is missing,
/// zero or not finite. Later samples without a finite close are dropped.
pub fn normalize_series(series: &HistorySeries) -> Option<NormalizedSeries> {
    let base = series.points.first()?.close?;
    if base == 0.0 || !base.is_finite() {
        return None;
    }

    let points = series
        .points
        .iter()
        .filter_map(|point| {
            let close = point.close.filter(|c| c.is_finite())?;
            // Divide first so the base sample lands on exactly INDEX_BASE.
            let value = INDEX_BASE * (close / base);
            value.is_finite().then(|| NormalizedPoint {
                date: point.date.clone(),
                value,
            })
        })
        .collect();

    Some(NormalizedSeries {
        ticker: series.ticker.clone(),
        points,
    })
}

/// Rebase every series and merge them into date-ascending chart rows.
///
/// Excluded series contribute nothing. Dates missing for some tickers are left
/// without an entry for those tickers; nothing is interpolated.
pub fn merge_normalized<'a, I>(series: I) -> Vec<ChartRow>
where
    I: IntoIterator<Item = &'a HistorySeries>,
{
    let mut rows: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    for normalized in series.into_iter().filter_map(normalize_series) {
        for point in normalized.points {
            rows.entry(point.date)
                .or_default()
                .insert(normalized.ticker.clone(), point.value);
        }
    }

    rows.into_iter()
        .map(|(date, values)| ChartRow { date, values })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HistoryPoint, HistoryRange};

    const EPS: f64 = 1e-9;

    fn series(ticker: &str, closes: &[(&str, Option<f64>)]) -> HistorySeries {
        HistorySeries::new(
            ticker,
            HistoryRange::ThreeMonths,
            closes
                .iter()
                .map(|(date, close)| HistoryPoint::new(*date, *close))
                .collect(),
        )
    }

    fn values(normalized: &NormalizedSeries) -> Vec<f64> {
        normalized.points.iter().map(|p| p.value).collect()
    }

    #[test]
    fn test_rebases_to_one_hundred() {
        let raw = series(
            "NDA",
            &[("2024-01-02", Some(10.0)), ("2024-01-03", Some(12.0)), ("2024-01-04", Some(9.0))],
        );
        let normalized = normalize_series(&raw).unwrap();
        let got = values(&normalized);
        assert_eq!(got.len(), 3);
        for (got, want) in got.iter().zip([100.0, 120.0, 90.0]) {
            assert!((got - want).abs() < EPS, "{got} != {want}");
        }
        assert_eq!(normalized.points[0].value, INDEX_BASE);
    }

    #[test]
    fn test_zero_missing_or_empty_base_is_excluded() {
        assert!(normalize_series(&series("A", &[("d1", Some(0.0)), ("d2", Some(5.0))])).is_none());
        assert!(normalize_series(&series("A", &[("d1", None), ("d2", Some(5.0))])).is_none());
        assert!(normalize_series(&series("A", &[("d1", Some(f64::NAN))])).is_none());
        assert!(normalize_series(&series("A", &[])).is_none());
    }

    #[test]
    fn test_unparseable_later_samples_are_dropped() {
        let raw = series(
            "A",
            &[("d1", Some(4.0)), ("d2", None), ("d3", Some(f64::INFINITY)), ("d4", Some(5.0))],
        );
        let normalized = normalize_series(&raw).unwrap();
        let dates: Vec<_> = normalized.points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, ["d1", "d4"]);
        assert!((normalized.points[1].value - 125.0).abs() < EPS);
    }

    #[test]
    fn test_excluded_series_does_not_affect_others() {
        let good = series("NDA", &[("2024-01-02", Some(10.0)), ("2024-01-03", Some(11.0))]);
        let bad = series("ZERO", &[("2024-01-02", Some(0.0)), ("2024-01-03", Some(1.0))]);

        let rows = merge_normalized([&good, &bad]);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.get("ZERO").is_none());
            assert!(row.get("NDA").is_some());
            assert_eq!(row.values.len(), 1);
        }
    }

    #[test]
    fn test_merge_matches_two_ticker_scenario() {
        let nda = series(
            "NDA",
            &[("2024-01-02", Some(100.0)), ("2024-01-03", Some(110.0)), ("2024-01-04", Some(121.0))],
        );
        let nokia = series(
            "NOKIA",
            &[("2024-01-02", Some(5.0)), ("2024-01-03", Some(5.5)), ("2024-01-04", Some(4.95))],
        );

        let rows = merge_normalized([&nda, &nokia]);
        let expected = [
            ("2024-01-02", 100.0, 100.0),
            ("2024-01-03", 110.0, 110.0),
            ("2024-01-04", 121.0, 99.0),
        ];
        assert_eq!(rows.len(), expected.len());
        for (row, (date, nda_value, nokia_value)) in rows.iter().zip(expected) {
            assert_eq!(row.date, date);
            assert!((row.get("NDA").unwrap() - nda_value).abs() < EPS);
            assert!((row.get("NOKIA").unwrap() - nokia_value).abs() < EPS);
        }
    }

    #[test]
    fn test_merge_sorts_dates_and_leaves_gaps() {
        let a = series("A", &[("2024-01-03", Some(2.0)), ("2024-01-05", Some(4.0))]);
        let b = series("B", &[("2024-01-01", Some(1.0)), ("2024-01-03", Some(3.0))]);

        let rows = merge_normalized([&a, &b]);
        let dates: Vec<_> = rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2024-01-01", "2024-01-03", "2024-01-05"]);

        assert!(rows[0].get("A").is_none());
        assert!(rows[2].get("B").is_none());
        assert_eq!(rows[1].values.len(), 2);
    }
}
