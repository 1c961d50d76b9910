//! Tabular time-series data parsed from the API's CSV endpoints.
//!
//! `/data/combined` and `/data/aggregate` answer with CSV: a header line
//! whose first cell names the timestamp column, then one line per sample.
//! [`TimeSeries`] keeps that shape (a timestamp index plus named numeric
//! columns with gaps) and is what the analysis functions consume.

use crate::range::parse_timestamp;
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::fmt::Write;
use tigo_core::{Result, TigoError};

/// Layout used when writing timestamps back out as CSV.
pub const CSV_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const DEFAULT_INDEX_NAME: &str = "Datetime";

/// A timestamp-indexed table of optional `f64` values.
///
/// Rows are always sorted by timestamp.
///
/// # Examples
///
/// ```
/// use tigo_client::TimeSeries;
///
/// let csv = "Datetime,Pin\n\
///            2024/06/01 10:00:00,1200\n\
///            2024/06/01 11:00:00,\n\
///            2024/06/01 12:00:00,1850.5\n";
///
/// let series = TimeSeries::parse_csv(csv).unwrap();
/// assert_eq!(series.len(), 3);
/// assert_eq!(series.columns(), ["Pin"]);
///
/// let present: Vec<f64> = series.values(0).collect();
/// assert_eq!(present, vec![1200.0, 1850.5]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    index_name: String,
    columns: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    rows: Vec<Vec<Option<f64>>>,
}

impl TimeSeries {
    /// Creates an empty series with the given value columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            columns,
            timestamps: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Parses API CSV output.
    ///
    /// Blank lines are skipped, empty or non-numeric cells become `None`,
    /// short rows are padded and surplus cells dropped. A timestamp that
    /// cannot be parsed is an error naming its (1-based) line.
    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Ok(Self::default());
        };

        let mut header_cells = header.split(',').map(clean_cell);
        let index_name = header_cells
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());
        let columns: Vec<String> = header_cells.collect();

        let mut series = Self {
            index_name,
            columns,
            timestamps: Vec::new(),
            rows: Vec::new(),
        };

        let mut truncated = 0usize;
        for (idx, line) in lines {
            let mut cells = line.split(',');
            let raw_ts = cells.next().map(clean_cell).unwrap_or_default();
            let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
                TigoError::csv(idx + 1, format!("unrecognized timestamp '{}'", raw_ts))
            })?;

            let mut row: Vec<Option<f64>> = cells.map(parse_value).collect();
            if row.len() > series.columns.len() {
                truncated += 1;
            }
            row.resize(series.columns.len(), None);

            series.timestamps.push(timestamp);
            series.rows.push(row);
        }

        if truncated > 0 {
            tracing::debug!("dropped surplus cells on {} CSV rows", truncated);
        }

        series.sort();
        Ok(series)
    }

    fn sort(&mut self) {
        if self.timestamps.is_sorted() {
            return;
        }
        let mut paired: Vec<(NaiveDateTime, Vec<Option<f64>>)> = self
            .timestamps
            .drain(..)
            .zip(self.rows.drain(..))
            .collect();
        paired.sort_by_key(|(ts, _)| *ts);
        for (ts, row) in paired {
            self.timestamps.push(ts);
            self.rows.push(row);
        }
    }

    /// Inserts a row, keeping timestamp order. Rows with equal timestamps
    /// keep insertion order.
    pub fn push_row(&mut self, timestamp: NaiveDateTime, mut values: Vec<Option<f64>>) {
        values.resize(self.columns.len(), None);
        let pos = self.timestamps.partition_point(|ts| *ts <= timestamp);
        self.timestamps.insert(pos, timestamp);
        self.rows.insert(pos, values);
    }

    /// Merges two series, e.g. consecutive chunks of one long request.
    ///
    /// Columns are matched by name; columns only present in `other` are
    /// appended. When both contain a timestamp, the row from `self` wins.
    pub fn concat(mut self, other: Self) -> Self {
        if self.columns.is_empty() && self.timestamps.is_empty() {
            return other;
        }

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| match self.column_index(name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(name.clone());
                    self.columns.len() - 1
                }
            })
            .collect();
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }

        let mut timestamps = Vec::with_capacity(self.timestamps.len() + other.timestamps.len());
        let mut rows = Vec::with_capacity(timestamps.capacity());
        let mut left = self.timestamps.into_iter().zip(self.rows).peekable();
        let mut right = other.timestamps.into_iter().zip(other.rows).peekable();

        let remap = |values: Vec<Option<f64>>| {
            let mut row = vec![None; width];
            for (value, &target) in values.into_iter().zip(&mapping) {
                row[target] = value;
            }
            row
        };

        loop {
            let order = match (left.peek(), right.peek()) {
                (Some((l, _)), Some((r, _))) => l.cmp(r),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match order {
                Ordering::Less => {
                    if let Some((ts, row)) = left.next() {
                        timestamps.push(ts);
                        rows.push(row);
                    }
                }
                Ordering::Greater => {
                    if let Some((ts, row)) = right.next() {
                        timestamps.push(ts);
                        rows.push(remap(row));
                    }
                }
                Ordering::Equal => {
                    right.next();
                    if let Some((ts, row)) = left.next() {
                        timestamps.push(ts);
                        rows.push(row);
                    }
                }
            }
        }

        Self {
            index_name: self.index_name,
            columns: self.columns,
            timestamps,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, idx: usize) -> Option<(NaiveDateTime, &[Option<f64>])> {
        Some((*self.timestamps.get(idx)?, self.rows.get(idx)?.as_slice()))
    }

    /// Every cell of one column, gaps included.
    pub fn column_at(&self, idx: usize) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.timestamps
            .iter()
            .zip(&self.rows)
            .map(move |(ts, row)| (*ts, row.get(idx).copied().flatten()))
    }

    /// Present values of a column with their timestamps.
    pub fn points(&self, idx: usize) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.column_at(idx)
            .filter_map(|(ts, value)| value.map(|v| (ts, v)))
    }

    /// Present values of a column.
    pub fn values(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.points(idx).map(|(_, v)| v)
    }

    /// Present values of a column looked up by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        self.column_index(name).map(|idx| self.values(idx).collect())
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Writes the series back out in the API's CSV layout.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.index_name);
        for column in &self.columns {
            out.push(',');
            out.push_str(column);
        }
        out.push('\n');

        for (ts, row) in self.timestamps.iter().zip(&self.rows) {
            let _ = write!(out, "{}", ts.format(CSV_TIME_FORMAT));
            for value in row {
                out.push(',');
                if let Some(v) = value {
                    let _ = write!(out, "{}", v);
                }
            }
            out.push('\n');
        }
        out
    }
}

fn clean_cell(cell: &str) -> String {
    cell.trim().trim_matches('"').trim().to_string()
}

fn parse_value(cell: &str) -> Option<f64> {
    let cell = cell.trim().trim_matches('"');
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}
