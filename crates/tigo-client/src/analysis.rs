//! Production analytics over [`TimeSeries`] data.
//!
//! Everything here is a pure function of already-fetched data; the client
//! wires them to the API in [`crate::client`].
//!
//! Power columns are interpreted as the average power (W) over each sample
//! interval, so a sample contributes `value × interval_hours` Wh of energy.

use crate::range::DataLevel;
use crate::timeseries::TimeSeries;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tigo_core::{Result, TigoError};

/// Average power above which a sample counts as producing.
pub const PRODUCTIVE_POWER_W: f64 = 50.0;

/// Daylight window used by efficiency figures: `[06:00, 20:00)`.
pub const DAYLIGHT_START_HOUR: u32 = 6;
pub const DAYLIGHT_END_HOUR: u32 = 20;

/// Widest bucket; buckets never span midnight.
pub const MAX_BUCKET_MINUTES: u32 = 24 * 60;

fn bucket_minutes(minutes: u32) -> u32 {
    minutes.clamp(1, MAX_BUCKET_MINUTES)
}

fn is_daylight(ts: NaiveDateTime) -> bool {
    (DAYLIGHT_START_HOUR..DAYLIGHT_END_HOUR).contains(&ts.hour())
}

/// Power statistics for one fixed-width time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerBucket {
    pub start: NaiveDateTime,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub readings: usize,
}

/// Groups a column into `minutes`-wide buckets aligned to midnight.
///
/// Gaps are skipped and buckets without any reading are not emitted.
/// `minutes` is clamped to `1..=MAX_BUCKET_MINUTES`.
///
/// # Examples
///
/// ```
/// use tigo_client::TimeSeries;
/// use tigo_client::analysis::aggregate_buckets;
///
/// let csv = "Datetime,Power\n\
///            2024/06/01 10:01:00,100\n\
///            2024/06/01 10:14:00,300\n\
///            2024/06/01 10:15:00,500\n";
/// let series = TimeSeries::parse_csv(csv).unwrap();
///
/// let buckets = aggregate_buckets(&series, 0, 15);
/// assert_eq!(buckets.len(), 2);
/// assert_eq!(buckets[0].avg_power, 200.0);
/// assert_eq!(buckets[0].readings, 2);
/// assert_eq!(buckets[1].max_power, 500.0);
/// ```
pub fn aggregate_buckets(series: &TimeSeries, column: usize, minutes: u32) -> Vec<PowerBucket> {
    let bucket_secs = bucket_minutes(minutes) * 60;
    let mut buckets: Vec<PowerBucket> = Vec::new();
    let mut sum = 0.0;

    for (ts, value) in series.points(column) {
        let secs = ts.time().num_seconds_from_midnight();
        let floored = secs - secs % bucket_secs;
        let start = ts.date().and_time(
            NaiveTime::from_num_seconds_from_midnight_opt(floored, 0).unwrap_or(NaiveTime::MIN),
        );

        match buckets.last_mut() {
            Some(bucket) if bucket.start == start => {
                sum += value;
                bucket.readings += 1;
                bucket.max_power = bucket.max_power.max(value);
                bucket.min_power = bucket.min_power.min(value);
                bucket.avg_power = sum / bucket.readings as f64;
            }
            _ => {
                sum = value;
                buckets.push(PowerBucket {
                    start,
                    avg_power: value,
                    max_power: value,
                    min_power: value,
                    readings: 1,
                });
            }
        }
    }

    buckets
}

/// Change in average power between the first and last bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerTrend {
    pub start_time: NaiveDateTime,
    pub start_power: f64,
    pub end_time: NaiveDateTime,
    pub end_power: f64,
}

impl PowerTrend {
    pub fn change(&self) -> f64 {
        self.end_power - self.start_power
    }
}

/// Roll-up of a bucket series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub buckets: usize,
    pub peak_power: f64,
    pub peak_time: NaiveDateTime,
    pub min_power: f64,
    pub average_power: f64,
    /// Σ bucket average × bucket hours, in kWh
    pub energy_kwh: f64,
    pub productive_buckets: usize,
    pub productive_hours: f64,
    pub trend: Option<PowerTrend>,
}

/// Summarizes buckets produced by [`aggregate_buckets`] with the same width.
///
/// Returns `None` for an empty slice.
pub fn summarize_buckets(buckets: &[PowerBucket], minutes: u32) -> Option<BucketSummary> {
    let first = buckets.first()?;
    let last = buckets.last()?;
    let bucket_hours = f64::from(bucket_minutes(minutes)) / 60.0;

    let peak = buckets
        .iter()
        .max_by(|a, b| a.max_power.total_cmp(&b.max_power))?;
    let min_power = buckets
        .iter()
        .map(|b| b.min_power)
        .fold(f64::INFINITY, f64::min);
    let avg_sum: f64 = buckets.iter().map(|b| b.avg_power).sum();
    let productive_buckets = buckets
        .iter()
        .filter(|b| b.avg_power > PRODUCTIVE_POWER_W)
        .count();

    let trend = (buckets.len() >= 2).then(|| PowerTrend {
        start_time: first.start,
        start_power: first.avg_power,
        end_time: last.start,
        end_power: last.avg_power,
    });

    Some(BucketSummary {
        buckets: buckets.len(),
        peak_power: peak.max_power,
        peak_time: peak.start,
        min_power,
        average_power: avg_sum / buckets.len() as f64,
        energy_kwh: avg_sum * bucket_hours / 1000.0,
        productive_buckets,
        productive_hours: productive_buckets as f64 * bucket_hours,
        trend,
    })
}

/// Sums a column per calendar date.
pub fn daily_totals(series: &TimeSeries, column: usize) -> BTreeMap<NaiveDate, f64> {
    let mut totals = BTreeMap::new();
    for (ts, value) in series.points(column) {
        *totals.entry(ts.date()).or_insert(0.0) += value;
    }
    totals
}

/// Picks the column holding system power: the first header mentioning power
/// or input power (`Pin`), otherwise the first column.
pub fn power_column(series: &TimeSeries) -> Option<usize> {
    if series.columns().is_empty() {
        return None;
    }
    let found = series.columns().iter().position(|name| {
        let name = name.to_ascii_lowercase();
        name.contains("power") || name.starts_with("pin")
    });
    Some(found.unwrap_or(0))
}

/// System-level efficiency figures over an analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyReport {
    /// Rated DC power (W)
    pub rated_power_dc: f64,
    pub peak_power: f64,
    /// Peak power as a percentage of rated power
    pub peak_efficiency: f64,
    /// Mean power over productive daylight samples
    pub average_power_daylight: f64,
    pub average_efficiency_percent: f64,
    /// Energy produced relative to rated power running around the clock
    pub capacity_factor: f64,
    pub analysis_period_days: u32,
    pub data_resolution: DataLevel,
    pub avg_productive_hours_per_day: f64,
    pub avg_daylight_hours_per_day: f64,
    pub samples: usize,
}

/// Computes efficiency figures for one power column.
///
/// Only samples inside the daylight window count towards averages, so night
/// hours do not drag the efficiency down.
pub fn system_efficiency(
    series: &TimeSeries,
    column: usize,
    rated_power_w: f64,
    days: u32,
    level: DataLevel,
) -> Result<EfficiencyReport> {
    if rated_power_w <= 0.0 {
        return Err(TigoError::InsufficientData(
            "system has no DC power rating".into(),
        ));
    }
    if days == 0 {
        return Err(TigoError::InsufficientData(
            "analysis period must be at least one day".into(),
        ));
    }

    let step_hours = level.step().num_seconds() as f64 / 3600.0;
    let mut samples = 0usize;
    let mut peak_power = 0.0f64;
    let mut energy_wh = 0.0;
    let mut daylight_samples = 0usize;
    let mut productive_sum = 0.0;
    let mut productive_samples = 0usize;

    for (ts, value) in series.points(column) {
        samples += 1;
        peak_power = peak_power.max(value);
        energy_wh += value.max(0.0) * step_hours;

        // Day-level samples have no meaningful hour of day
        if level == DataLevel::Day || is_daylight(ts) {
            daylight_samples += 1;
            if value > PRODUCTIVE_POWER_W {
                productive_sum += value;
                productive_samples += 1;
            }
        }
    }

    if samples == 0 {
        return Err(TigoError::InsufficientData(
            "no power readings in the analysis period".into(),
        ));
    }
    if productive_samples == 0 {
        return Err(TigoError::InsufficientData(
            "no productive daylight readings in the analysis period".into(),
        ));
    }

    let days_f = f64::from(days);
    let average_power_daylight = productive_sum / productive_samples as f64;

    Ok(EfficiencyReport {
        rated_power_dc: rated_power_w,
        peak_power,
        peak_efficiency: peak_power / rated_power_w * 100.0,
        average_power_daylight,
        average_efficiency_percent: average_power_daylight / rated_power_w * 100.0,
        capacity_factor: energy_wh / (rated_power_w * 24.0 * days_f) * 100.0,
        analysis_period_days: days,
        data_resolution: level,
        avg_productive_hours_per_day: productive_samples as f64 * step_hours / days_f,
        avg_daylight_hours_per_day: daylight_samples as f64 * step_hours / days_f,
        samples,
    })
}

/// Per-panel production statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelPerformance {
    /// Column header as returned by the API (panel label or object id)
    pub panel_id: String,
    pub mean_power: f64,
    pub max_power: f64,
    pub samples: usize,
    /// Mean power relative to the best panel's mean
    pub efficiency_percent: f64,
}

/// Ranks every panel column of an aggregate series, best first.
///
/// Means are taken over daylight samples only. Panels without any daylight
/// reading are left out.
pub fn panel_performance(series: &TimeSeries) -> Vec<PanelPerformance> {
    let mut panels: Vec<PanelPerformance> = series
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let (count, sum, max) = series
                .points(idx)
                .filter(|(ts, _)| is_daylight(*ts))
                .fold((0usize, 0.0, f64::NEG_INFINITY), |(n, s, m), (_, v)| {
                    (n + 1, s + v, m.max(v))
                });
            (count > 0).then(|| PanelPerformance {
                panel_id: name.clone(),
                mean_power: sum / count as f64,
                max_power: max,
                samples: count,
                efficiency_percent: 0.0,
            })
        })
        .collect();

    let best = panels
        .iter()
        .map(|p| p.mean_power)
        .fold(0.0f64, f64::max);
    for panel in &mut panels {
        panel.efficiency_percent = if best > 0.0 {
            panel.mean_power / best * 100.0
        } else {
            0.0
        };
    }

    panels.sort_by(|a, b| {
        b.efficiency_percent
            .total_cmp(&a.efficiency_percent)
            .then_with(|| a.panel_id.cmp(&b.panel_id))
    });
    panels
}

/// Panels whose relative efficiency is below `threshold_percent`.
pub fn underperforming(panels: &[PanelPerformance], threshold_percent: f64) -> Vec<PanelPerformance> {
    panels
        .iter()
        .filter(|p| p.efficiency_percent < threshold_percent)
        .cloned()
        .collect()
}

/// Qualitative grade for a daylight efficiency percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Acceptable,
    Poor,
}

impl Rating {
    pub fn from_efficiency(percent: f64) -> Self {
        if percent > 75.0 {
            Self::Excellent
        } else if percent > 60.0 {
            Self::Good
        } else if percent > 45.0 {
            Self::Fair
        } else if percent > 30.0 {
            Self::Acceptable
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Fair => "FAIR",
            Self::Acceptable => "ACCEPTABLE",
            Self::Poor => "POOR",
        }
    }
}

/// Shorthand for [`Rating::from_efficiency`].
pub fn rating(efficiency_percent: f64) -> Rating {
    Rating::from_efficiency(efficiency_percent)
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label())
    }
}
