use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SeriesError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC observation. `price` mirrors `close` unless the source
/// supplied its own value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Interval open time, milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub price: f64,
}

impl PriceBar {
    /// Build a bar whose `price` equals `close`.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            price: close,
        }
    }

    /// Build a close-only bar with `open = high = low = close`.
    pub fn flat(timestamp: i64, close: f64) -> Self {
        Self::new(timestamp, close, close, close, close)
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("price", self.price),
        ]
    }
}

/// A row as it arrives from an adapter that may omit columns.
///
/// `close` falls back to `price`; missing open/high/low are synthesized from
/// the close so high/low indicators degrade to close-only variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: i64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl RawBar {
    /// A row that only carries a `price` column.
    pub fn price_only(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            price: Some(price),
            ..Self::default()
        }
    }

    fn normalize(&self, index: usize) -> Result<PriceBar, SeriesError> {
        let close = self
            .close
            .or(self.price)
            .ok_or(SeriesError::MissingPriceColumn { index })?;

        Ok(PriceBar {
            timestamp: self.timestamp,
            open: self.open.unwrap_or(close),
            high: self.high.unwrap_or(close),
            low: self.low.unwrap_or(close),
            close,
            price: self.price.unwrap_or(close),
        })
    }
}

// ---------------------------------------------------------------------------
// PriceSeries -- validated, immutable input to the indicator pipeline
// ---------------------------------------------------------------------------

/// Ordered, non-empty sequence of bars with strictly increasing timestamps and
/// finite, non-negative prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate `bars` and wrap them. Fails fast on the first structural
    /// violation; nothing is filtered.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }

        for (index, bar) in bars.iter().enumerate() {
            for (field, value) in bar.fields() {
                if !value.is_finite() {
                    return Err(SeriesError::NonFinitePrice { index, field });
                }
                if value < 0.0 {
                    return Err(SeriesError::NegativePrice {
                        index,
                        field,
                        value,
                    });
                }
            }
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp <= previous {
                    return Err(SeriesError::NonMonotonicTimestamp {
                        index,
                        timestamp: bar.timestamp,
                        previous,
                    });
                }
            }
        }

        Ok(Self { bars })
    }

    /// Normalize rows with optional columns, then validate.
    pub fn from_raw(rows: &[RawBar]) -> Result<Self, SeriesError> {
        if rows.is_empty() {
            return Err(SeriesError::Empty);
        }
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, row)| row.normalize(i))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(bars)
    }

    /// Repair a raw adapter series instead of rejecting it:
    ///
    /// 1. drop duplicate timestamps, keeping the first occurrence;
    /// 2. sort by timestamp;
    /// 3. forward-fill non-finite fields from the previous row;
    /// 4. drop rows that still hold a non-finite field;
    /// 5. drop rows with any price `<= 0`.
    pub fn clean(mut bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let input_len = bars.len();

        let mut seen = std::collections::HashSet::with_capacity(bars.len());
        bars.retain(|b| seen.insert(b.timestamp));
        bars.sort_by_key(|b| b.timestamp);

        let mut previous: Option<PriceBar> = None;
        for bar in &mut bars {
            if let Some(prev) = previous {
                forward_fill(&mut bar.open, prev.open);
                forward_fill(&mut bar.high, prev.high);
                forward_fill(&mut bar.low, prev.low);
                forward_fill(&mut bar.close, prev.close);
                forward_fill(&mut bar.price, prev.price);
            }
            previous = Some(*bar);
        }

        bars.retain(|b| b.fields().iter().all(|(_, v)| v.is_finite() && *v > 0.0));

        debug!(
            input = input_len,
            kept = bars.len(),
            "price series cleaned"
        );

        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

fn forward_fill(value: &mut f64, previous: f64) {
    if !value.is_finite() {
        *value = previous;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> PriceBar {
        PriceBar::new(ts, close, close + 1.0, close - 1.0, close)
    }

    #[test]
    fn new_rejects_empty() {
        assert_eq!(PriceSeries::new(Vec::new()), Err(SeriesError::Empty));
    }

    #[test]
    fn new_rejects_duplicate_timestamps() {
        let err = PriceSeries::new(vec![bar(1, 10.0), bar(1, 11.0)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NonMonotonicTimestamp {
                index: 1,
                timestamp: 1,
                previous: 1
            }
        );
    }

    #[test]
    fn new_rejects_non_finite_and_negative() {
        let mut b = bar(2, 10.0);
        b.high = f64::NAN;
        let err = PriceSeries::new(vec![bar(1, 10.0), b]).unwrap_err();
        assert_eq!(err, SeriesError::NonFinitePrice { index: 1, field: "high" });

        let mut b = bar(1, 10.0);
        b.low = -0.5;
        assert!(matches!(
            PriceSeries::new(vec![b]),
            Err(SeriesError::NegativePrice { index: 0, field: "low", .. })
        ));
    }

    #[test]
    fn from_raw_synthesizes_ohlc_from_price() {
        let rows = vec![RawBar::price_only(1, 10.0), RawBar::price_only(2, 12.0)];
        let series = PriceSeries::from_raw(&rows).unwrap();
        let last = series.last().unwrap();
        assert_eq!(last.open, 12.0);
        assert_eq!(last.high, 12.0);
        assert_eq!(last.low, 12.0);
        assert_eq!(last.close, 12.0);
        assert_eq!(last.price, 12.0);
    }

    #[test]
    fn from_raw_keeps_supplied_price() {
        let rows = vec![RawBar {
            timestamp: 1,
            close: Some(10.0),
            price: Some(10.5),
            ..RawBar::default()
        }];
        let series = PriceSeries::from_raw(&rows).unwrap();
        assert_eq!(series.bars()[0].close, 10.0);
        assert_eq!(series.bars()[0].price, 10.5);
    }

    #[test]
    fn from_raw_missing_price_column_fails_fast() {
        let rows = vec![
            RawBar::price_only(1, 10.0),
            RawBar {
                timestamp: 2,
                high: Some(11.0),
                ..RawBar::default()
            },
        ];
        assert_eq!(
            PriceSeries::from_raw(&rows),
            Err(SeriesError::MissingPriceColumn { index: 1 })
        );
    }

    #[test]
    fn from_raw_empty_fails() {
        assert_eq!(PriceSeries::from_raw(&[]), Err(SeriesError::Empty));
    }

    #[test]
    fn clean_dedups_sorts_and_fills() {
        let mut gap = bar(3, 12.0);
        gap.close = f64::NAN;
        let bars = vec![bar(2, 11.0), bar(1, 10.0), bar(2, 99.0), gap];
        let series = PriceSeries::clean(bars).unwrap();

        let closes = series.closes();
        // Duplicate ts=2 keeps the first (11.0); NaN close is forward-filled.
        assert_eq!(closes, vec![10.0, 11.0, 11.0]);
        let ts: Vec<i64> = series.bars().iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![1, 2, 3]);
    }

    #[test]
    fn clean_drops_non_positive_and_unfillable_rows() {
        let mut leading_nan = bar(1, 10.0);
        leading_nan.open = f64::NAN;
        let bars = vec![leading_nan, bar(2, 0.0), bar(3, 5.0)];
        let series = PriceSeries::clean(bars).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].timestamp, 3);
    }

    #[test]
    fn clean_everything_dropped_is_empty() {
        assert_eq!(
            PriceSeries::clean(vec![bar(1, 0.0)]),
            Err(SeriesError::Empty)
        );
    }
}
