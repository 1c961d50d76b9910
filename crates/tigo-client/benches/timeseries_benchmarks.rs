//! Benchmarks for CSV parsing and bucketing of telemetry data.
//!
//! Sizes mirror real responses:
//! - one day of minute data for a system: 1440 rows, 1 column
//! - one day of minute data for 40 panels: 1440 rows, 40 columns
//! - a month of hourly data: 744 rows

use chrono::{NaiveDate, TimeDelta};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tigo_client::TimeSeries;
use tigo_client::analysis::{aggregate_buckets, panel_performance, summarize_buckets};

/// Generates `rows` samples spaced `step_minutes` apart with `columns` values each.
fn generate_csv(rows: usize, columns: usize, step_minutes: i64) -> String {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let mut csv = String::from("Datetime");
    for c in 0..columns {
        csv.push_str(&format!(",A{}", c + 1));
    }
    csv.push('\n');

    for r in 0..rows {
        let ts = start + TimeDelta::minutes(r as i64 * step_minutes);
        csv.push_str(&ts.format("%Y/%m/%d %H:%M:%S").to_string());
        for c in 0..columns {
            csv.push_str(&format!(",{}", (r * 7 + c * 13) % 400));
        }
        csv.push('\n');
    }
    csv
}

fn bench_csv_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_parsing");

    for (name, rows, columns, step) in [
        ("system_day_minute", 1440, 1, 1),
        ("panels_day_minute", 1440, 40, 1),
        ("system_month_hour", 744, 1, 60),
    ] {
        let csv = generate_csv(rows, columns, step);
        group.bench_with_input(BenchmarkId::from_parameter(name), &csv, |b, csv| {
            b.iter(|| TimeSeries::parse_csv(black_box(csv)))
        });
    }

    group.finish();
}

fn bench_bucketing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucketing");
    let series = TimeSeries::parse_csv(&generate_csv(1440, 1, 1)).unwrap();

    for minutes in [5u32, 15, 60] {
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &minutes, |b, &m| {
            b.iter(|| {
                let buckets = aggregate_buckets(black_box(&series), 0, m);
                summarize_buckets(&buckets, m)
            })
        });
    }

    group.finish();
}

fn bench_panel_ranking(c: &mut Criterion) {
    let series = TimeSeries::parse_csv(&generate_csv(1440, 40, 1)).unwrap();

    c.bench_function("panel_performance_40", |b| {
        b.iter(|| panel_performance(black_box(&series)))
    });
}

fn bench_concat(c: &mut Criterion) {
    let first = TimeSeries::parse_csv(&generate_csv(1440, 1, 1)).unwrap();
    let second = TimeSeries::parse_csv(&generate_csv(2880, 1, 1)).unwrap();

    c.bench_function("concat_overlapping_days", |b| {
        b.iter(|| black_box(first.clone()).concat(black_box(second.clone())))
    });
}

criterion_group!(
    benches,
    bench_csv_parsing,
    bench_bucketing,
    bench_panel_ranking,
    bench_concat
);
criterion_main!(benches);
