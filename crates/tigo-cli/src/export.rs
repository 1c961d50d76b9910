//! CSV export of combined and aggregate telemetry.

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tigo_client::range::parse_timestamp;
use tigo_client::{TimeRange, TimeSeries};

/// Resolves the export window from `--start`/`--end`, or the last `days`
/// days when no start is given. A missing end means `now`.
pub(crate) fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    now: NaiveDateTime,
) -> Result<TimeRange> {
    let end = match end {
        Some(raw) => parse_timestamp(raw).with_context(|| format!("invalid --end '{}'", raw))?,
        None => now,
    };
    let range = match start {
        Some(raw) => {
            let start =
                parse_timestamp(raw).with_context(|| format!("invalid --start '{}'", raw))?;
            TimeRange::new(start, end)?
        }
        None => TimeRange::days_back(end, days)?,
    };
    Ok(range)
}

/// Parses a comma separated list of object ids such as `101,102`.
pub(crate) fn parse_object_ids(raw: &str) -> Result<Vec<i64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .with_context(|| format!("invalid object id '{}'", id))
        })
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        bail!("no object ids given");
    }
    Ok(ids)
}

/// Writes the series as CSV to `output`, or stdout when no path is given.
pub(crate) fn write_csv(series: &TimeSeries, output: Option<&Path>) -> Result<()> {
    let csv = series.to_csv();
    match output {
        Some(path) => {
            fs::write(path, &csv).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("wrote {} rows to {}", series.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
