//! Plain-text rendering of API data and analysis results.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tigo_client::analysis::{self, BucketSummary, PowerBucket, Rating};
use tigo_client::{
    AlertList, AlertType, EfficiencyReport, EnergySummary, Layout, PanelPerformance, Source,
    System, TimeSeries, User,
};

const RULE_WIDTH: usize = 60;
const ALERT_MESSAGE_CHARS: usize = 100;
const ALERT_TYPES_SHOWN: usize = 5;
const TOP_PANELS_SHOWN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Success,
    Warning,
    Error,
    Info,
}

impl Status {
    fn icon(self) -> &'static str {
        match self {
            Self::Success => "[OK]",
            Self::Warning => "[WARN]",
            Self::Error => "[ERROR]",
            Self::Info => "[INFO]",
        }
    }
}

/// Accumulates report text so rendering stays independent of stdout.
#[derive(Debug, Default)]
pub(crate) struct Report {
    out: String,
}

impl Report {
    pub(crate) fn section(&mut self, title: &str) {
        let rule = "=".repeat(RULE_WIDTH);
        self.line("");
        self.line(&rule);
        self.line(format!(" {}", title));
        self.line(&rule);
    }

    pub(crate) fn subsection(&mut self, title: &str) {
        self.line("");
        self.line(format!("--- {} ---", title));
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub(crate) fn status(&mut self, status: Status, text: impl AsRef<str>) {
        self.line(format!("{} {}", status.icon(), text.as_ref()));
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

pub(crate) fn user(r: &mut Report, user: &User) {
    r.subsection("User Information");
    r.line(format!("User: {}", user.full_name()));
    r.line(format!("Email: {}", user.email));
    r.line(format!("Systems: {}", user.system_count));
}

pub(crate) fn systems(r: &mut Report, systems: &[System]) {
    r.subsection("Available Systems");
    if systems.is_empty() {
        r.status(Status::Error, "No systems found!");
        return;
    }
    for (i, system) in systems.iter().enumerate() {
        r.line(format!("{}. {} (ID: {})", i + 1, system.name, system.system_id));
        r.line(format!("   Location: {}", system.location()));
        r.line(format!("   Power Rating: {:.1} kW", system.power_rating_kw()));
        r.line(format!("   Status: {}", system.status));
    }
}

pub(crate) fn layout(r: &mut Report, layout: &Layout) {
    r.subsection("System Configuration");
    for inverter in &layout.inverters {
        r.line(format!("Inverter: {}", inverter.label));
        for mppt in &inverter.mppts {
            r.line(format!("  MPPT: {}", mppt.label));
            for string in &mppt.strings {
                r.line(format!("    {}: {} panels", string.label, string.panels.len()));
            }
        }
    }
    r.line("");
    r.line(format!("Total Panels: {}", layout.panel_count()));
}

pub(crate) fn sources(r: &mut Report, sources: &[Source]) {
    r.subsection("Data Sources");
    if sources.is_empty() {
        r.line("No data sources reported");
    }
    for source in sources {
        r.line(format!("Source: {} ({})", source.name, source.serial));
        r.line(format!(
            "  Last Check-in: {}",
            source.last_checkin.as_deref().unwrap_or("unknown")
        ));
        r.line(format!(
            "  Control State: {}",
            source.control_state.as_deref().unwrap_or("unknown")
        ));
        r.line(format!("  Panels: {}", source.panel_count));
    }
}

pub(crate) fn summary(r: &mut Report, summary: &EnergySummary) {
    r.subsection("System Summary");
    r.line(format!("Current Power: {:.2} kW", summary.last_power_kw()));
    r.line(format!("Today's Energy: {:.2} kWh", summary.daily_energy_kwh()));
    r.line(format!("Year-to-Date: {:.1} kWh", summary.ytd_energy_kwh()));
    r.line(format!("Lifetime Energy: {:.1} kWh", summary.lifetime_energy_kwh()));
    r.line(format!(
        "Last Update: {}",
        summary.updated_on.as_deref().unwrap_or("unknown")
    ));
}

/// Peak, average and latest reading of today's hourly data.
pub(crate) fn today(r: &mut Report, series: &TimeSeries) {
    r.subsection("Today's Performance");
    let values: Vec<f64> = analysis::power_column(series)
        .map(|idx| series.values(idx).collect())
        .unwrap_or_default();
    let Some(&current) = values.last() else {
        r.line("No data available for today");
        return;
    };

    let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average = values.iter().sum::<f64>() / values.len() as f64;
    r.line(format!("Data points today: {} (hourly readings)", values.len()));
    r.line(format!("Peak power: {:.0} W", peak));
    r.line(format!("Average power: {:.0} W", average));
    r.line(format!("Current power: {:.0} W", current));
}

/// Daily energy in Wh keyed by date.
pub(crate) fn weekly(r: &mut Report, totals: &BTreeMap<NaiveDate, f64>) {
    r.subsection("Weekly Performance Trend");
    if totals.is_empty() {
        r.line("No weekly data available");
        return;
    }

    r.line("Daily energy production:");
    for (date, wh) in totals {
        r.line(format!("  {}: {:.1} kWh", date.format("%Y-%m-%d"), wh / 1000.0));
    }
    let total_kwh = totals.values().sum::<f64>() / 1000.0;
    r.line("");
    r.line(format!("Period total: {:.1} kWh", total_kwh));
    r.line(format!("Daily average: {:.1} kWh", total_kwh / totals.len() as f64));
}

pub(crate) fn efficiency(r: &mut Report, report: &EfficiencyReport) {
    r.subsection("Efficiency Metrics (Daylight Hours Only)");
    r.line(format!("Rated Power: {:.1} kW", report.rated_power_dc / 1000.0));
    r.line(format!(
        "Peak Power: {:.0} W ({:.1}% of rated)",
        report.peak_power, report.peak_efficiency
    ));
    r.line(format!(
        "Average Power (daylight): {:.0} W",
        report.average_power_daylight
    ));
    r.line(format!(
        "Daylight Efficiency: {:.1}%",
        report.average_efficiency_percent
    ));
    r.line(format!("Capacity Factor: {:.1}%", report.capacity_factor));
    r.line(format!("Analysis Period: {} days", report.analysis_period_days));
    r.line(format!("Data Resolution: {}", report.data_resolution));
    r.line(format!(
        "Productive Hours/Day: {:.1} hours",
        report.avg_productive_hours_per_day
    ));
    r.line(format!(
        "Daylight Hours/Day: {:.1} hours",
        report.avg_daylight_hours_per_day
    ));
    r.line(format!(
        "Performance Rating: {}",
        Rating::from_efficiency(report.average_efficiency_percent)
    ));
}

pub(crate) fn panels(r: &mut Report, panels: &[PanelPerformance], threshold_percent: f64) {
    r.subsection("Individual Panel Performance");
    if panels.is_empty() {
        r.line("No panel-level data available");
        return;
    }

    r.line(format!("Top {} performing panels:", TOP_PANELS_SHOWN.min(panels.len())));
    r.line(format!(
        "  {:<12} {:>10} {:>10} {:>8}",
        "Panel", "Mean (W)", "Peak (W)", "Eff (%)"
    ));
    for panel in panels.iter().take(TOP_PANELS_SHOWN) {
        r.line(format!(
            "  {:<12} {:>10.0} {:>10.0} {:>8.1}",
            panel.panel_id, panel.mean_power, panel.max_power, panel.efficiency_percent
        ));
    }

    r.subsection("Underperforming Panel Detection");
    let weak = analysis::underperforming(panels, threshold_percent);
    if weak.is_empty() {
        r.status(
            Status::Success,
            format!("All panels performing above {:.0}% threshold", threshold_percent),
        );
        return;
    }

    r.status(
        Status::Warning,
        format!(
            "Found {} panels performing below {:.0}%:",
            weak.len(),
            threshold_percent
        ),
    );
    for panel in &weak {
        r.line(format!(
            "  Panel {}: {:.1}% efficiency",
            panel.panel_id, panel.efficiency_percent
        ));
        r.line(format!(
            "    Average: {:.0}W, Peak: {:.0}W",
            panel.mean_power, panel.max_power
        ));
    }
}

pub(crate) fn alerts(r: &mut Report, alerts: &AlertList, include_archived: bool) {
    r.subsection("Active Alerts");
    let shown: Vec<_> = if include_archived {
        alerts.alerts.iter().collect()
    } else {
        alerts.active().collect()
    };
    if shown.is_empty() {
        r.status(Status::Success, "No active alerts");
        return;
    }

    for alert in shown {
        r.status(Status::Warning, &alert.title);
        r.line(format!(
            "   Generated: {}",
            alert.generated.as_deref().unwrap_or("unknown")
        ));
        r.line(format!("   Message: {}", truncate(&alert.message, ALERT_MESSAGE_CHARS)));
    }
}

pub(crate) fn alert_types(r: &mut Report, types: &[AlertType]) {
    r.subsection("Available Alert Types");
    r.line(format!("System monitors for {} types of issues:", types.len()));
    for alert_type in types.iter().take(ALERT_TYPES_SHOWN) {
        r.line(format!("  - {}", alert_type.title));
    }
    if types.len() > ALERT_TYPES_SHOWN {
        r.line(format!("  ... and {} more", types.len() - ALERT_TYPES_SHOWN));
    }
}

/// Bucket table followed by the roll-up of the same buckets.
pub(crate) fn buckets(r: &mut Report, buckets: &[PowerBucket], minutes: u32) {
    let Some(summary) = analysis::summarize_buckets(buckets, minutes) else {
        r.line("No data available for the last 24 hours");
        return;
    };

    r.line(format!(
        "Aggregated into {} {}-minute chunks:",
        buckets.len(),
        minutes
    ));
    r.line("     #  Time                Avg Power  Max Power  Min Power  Readings");
    r.line(format!("   {}", "-".repeat(70)));
    for (i, bucket) in buckets.iter().enumerate() {
        r.line(format!(
            "  {:3}. {}   {:8.0}W  {:8.0}W  {:8.0}W    {:2}",
            i + 1,
            bucket.start.format("%Y-%m-%d %H:%M"),
            bucket.avg_power,
            bucket.max_power,
            bucket.min_power,
            bucket.readings
        ));
    }

    bucket_summary(r, &summary, minutes);
}

fn bucket_summary(r: &mut Report, summary: &BucketSummary, minutes: u32) {
    r.subsection(&format!("24-Hour Summary (from {}-min chunks)", minutes));
    r.line(format!("Total {}-min chunks: {}", minutes, summary.buckets));
    r.line(format!(
        "Peak power: {:.0} W at {}",
        summary.peak_power,
        summary.peak_time.format("%Y-%m-%d %H:%M")
    ));
    r.line(format!("Min power: {:.0} W", summary.min_power));
    r.line(format!("Avg power (24h): {:.0} W", summary.average_power));
    r.line(format!("Estimated energy (24h): {:.2} kWh", summary.energy_kwh));
    r.line(format!(
        "Productive chunks (>{:.0}W): {} ({:.1} hours)",
        analysis::PRODUCTIVE_POWER_W,
        summary.productive_buckets,
        summary.productive_hours
    ));
    r.line(format!(
        "Low/nighttime chunks: {}",
        summary.buckets - summary.productive_buckets
    ));
    if let Some(trend) = &summary.trend {
        r.line(format!(
            "Power trend: {:+.0}W ({}: {:.0}W -> {}: {:.0}W)",
            trend.change(),
            trend.start_time.format("%H:%M"),
            trend.start_power,
            trend.end_time.format("%H:%M"),
            trend.end_power
        ));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
