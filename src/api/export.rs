// =============================================================================
// CSV Export — augmented series and current metrics
// =============================================================================
//
// Undefined indicator points are written as empty fields.
// =============================================================================

use anyhow::{Context, Result};

use crate::pipeline::AugmentedSeries;

const BAR_HEADERS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "price"];

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per bar: OHLC fields followed by every indicator column.
pub fn indicators_csv(series: &AugmentedSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    let header = BAR_HEADERS
        .iter()
        .copied()
        .chain(series.column_names());
    wtr.write_record(header).context("failed to write CSV header")?;

    for (i, bar) in series.bars.iter().enumerate() {
        let mut record = vec![
            bar.timestamp.to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.price.to_string(),
        ];
        record.extend(
            series
                .columns
                .iter()
                .map(|c| cell(c.values.get(i).copied().flatten())),
        );
        wtr.write_record(&record)
            .with_context(|| format!("failed to write CSV row {i}"))?;
    }

    finish(wtr)
}

/// `metric,value` rows.
pub fn metrics_csv(rows: &[(&str, Option<f64>)]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["metric", "value"])
        .context("failed to write CSV header")?;
    for (name, value) in rows {
        wtr.write_record([name.to_string(), cell(*value)])
            .with_context(|| format!("failed to write metric {name}"))?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
