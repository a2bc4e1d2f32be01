//! Data loading
//!
//! Reads the OHLCV price series from CSV. Columns are located by header
//! name, so extra columns and any column order are accepted.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::{Bar, PriceSeries};

const DATETIME_HEADERS: &[&str] = &["datetime", "date", "timestamp", "time"];

/// Header positions of the columns the series needs
#[derive(Debug, Clone, Copy)]
struct Columns {
    datetime: Option<usize>,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| find(name).with_context(|| format!("Missing {} column", name));

        Ok(Columns {
            datetime: DATETIME_HEADERS.iter().find_map(|name| find(*name)),
            open: require("Open")?,
            high: require("High")?,
            low: require("Low")?,
            close: require("Close")?,
            volume: require("Volume")?,
        })
    }
}

/// Parse unix seconds, RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .with_context(|| format!("Timestamp out of range: {}", s));
    }
    if let Ok(secs) = s.parse::<f64>() {
        return DateTime::from_timestamp(secs.trunc() as i64, 0)
            .with_context(|| format!("Timestamp out of range: {}", s));
    }
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse datetime: {}", s))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Failed to parse datetime: {}", s))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc))
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64> {
    record
        .get(idx)
        .with_context(|| format!("Missing {} value", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Read a series from any CSV source; rows must be in chronological order
pub fn read_csv<R: Read>(source: R, label: &str) -> Result<PriceSeries> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns = Columns::locate(&headers)?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let datetime = match columns.datetime {
            Some(idx) => Some(parse_datetime(record.get(idx).unwrap_or_default())?),
            None => None,
        };
        let open = parse_field(&record, columns.open, "open")?;
        let high = parse_field(&record, columns.high, "high")?;
        let low = parse_field(&record, columns.low, "low")?;
        let close = parse_field(&record, columns.close, "close")?;
        let volume = parse_field(&record, columns.volume, "volume")?;

        // +2 for 1-indexed rows and the header line
        let bar = Bar::new(bars.len(), datetime, open, high, low, close, volume)
            .with_context(|| format!("Invalid bar at row {} in {}", row_idx + 2, label))?;
        bars.push(bar);
    }

    Ok(PriceSeries::new(bars))
}

/// Load the price series from a CSV file
pub fn load_csv(path: impl AsRef<Path>) -> Result<PriceSeries> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    let series = read_csv(file, &path.display().to_string())?;

    if series.is_empty() {
        bail!("No bars loaded from {}", path.display());
    }
    info!("Loaded {} bars from {}", series.len(), path.display());
    Ok(series)
}
