mod export;
mod report;

use anyhow::{Context, Result, bail};
use chrono::{Local, TimeDelta};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use report::{Report, Status};
use std::path::PathBuf;
use tigo_client::analysis::{self, aggregate_buckets};
use tigo_client::{
    AggregateQuery, Credentials, DataLevel, System, TigoClient, TigoConfig, TigoError, TimeRange,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Query and analyze Tigo Energy solar systems.
#[derive(Parser, Debug)]
#[command(name = "tigo", version, about)]
struct Cli {
    /// Tigo account username
    #[arg(long, env = "TIGO_USERNAME", global = true)]
    username: Option<String>,

    /// Tigo account password
    #[arg(long, env = "TIGO_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Override the API base URL
    #[arg(long, env = "TIGO_API_URL", global = true)]
    api_url: Option<String>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// System to inspect; defaults to the first system on the account
    #[arg(long, short, global = true)]
    system: Option<i64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List systems on the account
    Systems,
    /// Current power and energy totals
    Summary,
    /// Inverter, MPPT and string layout
    Layout,
    /// Alerts raised for the system
    Alerts {
        /// Include archived alerts
        #[arg(long)]
        all: bool,
    },
    /// Daylight efficiency and capacity factor
    Efficiency {
        #[arg(long, default_value_t = 14)]
        days: u32,
    },
    /// Per-panel performance ranking
    Panels {
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Relative efficiency below which a panel is flagged
        #[arg(long, default_value_t = 85.0)]
        threshold: f64,
    },
    /// Full walk-through of account, system and production data
    Report {
        /// Width of the buckets in the last-24-hours table
        #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..=1440))]
        bucket_minutes: u32,
    },
    /// Export telemetry as CSV
    Export(ExportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dataset {
    /// System-level data from /data/combined
    Combined,
    /// Object-level data from /data/aggregate
    Aggregate,
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    #[arg(long, value_enum, default_value_t = Dataset::Combined)]
    dataset: Dataset,

    /// minute, hour or day
    #[arg(long, default_value = "hour")]
    level: String,

    /// Start of the window (e.g. 2024-06-01 or 2024-06-01T06:00)
    #[arg(long)]
    start: Option<String>,

    /// End of the window; defaults to now
    #[arg(long)]
    end: Option<String>,

    /// Days back from the end when no start is given
    #[arg(long, default_value_t = 1)]
    days: u32,

    /// Measured quantity for aggregate exports
    #[arg(long, default_value = "Pin")]
    param: String,

    /// Comma separated object ids for aggregate exports; defaults to all panels
    #[arg(long)]
    objects: Option<String>,

    /// Output file; defaults to stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = TigoClient::new(credentials(&cli)?, load_config(&cli)?)?;
    let result = run(&client, &cli).await;

    if let Err(e) = client.logout().await {
        warn!("logout failed: {}", e);
    }
    result
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn credentials(cli: &Cli) -> Result<Credentials> {
    match (cli.username.as_deref(), cli.password.as_deref()) {
        (Some(user), Some(pass)) if !user.trim().is_empty() && !pass.trim().is_empty() => {
            Ok(Credentials::new(user.trim(), pass))
        }
        _ => Err(anyhow::Error::from(TigoError::MissingCredentials)
            .context("pass --username/--password or set TIGO_USERNAME/TIGO_PASSWORD")),
    }
}

fn load_config(cli: &Cli) -> Result<TigoConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = TigoConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => TigoConfig::from_env()?,
    };
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.clone());
    }
    debug!("using API at {}", config.api_root());
    Ok(config)
}

async fn select_system(client: &TigoClient, requested: Option<i64>) -> Result<System> {
    if let Some(id) = requested {
        return client
            .get_system(id)
            .await
            .with_context(|| format!("failed to load system {}", id));
    }
    let systems = client.list_all_systems().await?;
    match systems.into_iter().next() {
        Some(system) => Ok(system),
        None => bail!("no systems found on this account"),
    }
}

async fn run(client: &TigoClient, cli: &Cli) -> Result<()> {
    let mut r = Report::default();

    match &cli.command {
        Command::Systems => {
            let systems = client.list_all_systems().await?;
            report::systems(&mut r, &systems);
        }
        Command::Summary => {
            let system = select_system(client, cli.system).await?;
            let summary = client.get_summary(system.system_id).await?;
            r.status(Status::Info, format!("{} (ID: {})", system.name, system.system_id));
            report::summary(&mut r, &summary);
        }
        Command::Layout => {
            let system = select_system(client, cli.system).await?;
            let layout = client.get_system_layout(system.system_id).await?;
            report::layout(&mut r, &layout);
        }
        Command::Alerts { all } => {
            let system = select_system(client, cli.system).await?;
            let alerts = client.get_alerts(system.system_id).await?;
            report::alerts(&mut r, &alerts, *all);
        }
        Command::Efficiency { days } => {
            let system = select_system(client, cli.system).await?;
            let efficiency = client
                .calculate_system_efficiency(system.system_id, *days)
                .await?;
            report::efficiency(&mut r, &efficiency);
        }
        Command::Panels { days, threshold } => {
            let system = select_system(client, cli.system).await?;
            let panels = client.get_panel_performance(system.system_id, *days).await?;
            report::panels(&mut r, &panels, *threshold);
        }
        Command::Report { bucket_minutes } => {
            full_report(client, &mut r, cli.system, *bucket_minutes).await?;
        }
        Command::Export(args) => {
            let system = select_system(client, cli.system).await?;
            return export_data(client, system.system_id, args).await;
        }
    }

    print!("{}", r.finish());
    Ok(())
}

/// Walks through everything the API offers for one system. Failures in the
/// analysis sections are reported inline so the rest of the report still runs.
async fn full_report(
    client: &TigoClient,
    r: &mut Report,
    requested: Option<i64>,
    bucket_minutes: u32,
) -> Result<()> {
    client.login().await?;
    r.status(Status::Success, "Successfully logged in!");

    r.section("BASIC SYSTEM INFORMATION");
    report::user(r, &client.get_user().await?);
    let systems = client.list_all_systems().await?;
    report::systems(r, &systems);

    let system = match requested {
        Some(id) => client.get_system(id).await?,
        None => match systems.into_iter().next() {
            Some(system) => system,
            None => return Ok(()),
        },
    };
    let id = system.system_id;
    r.line("");
    r.status(
        Status::Info,
        format!("Using system: {} (ID: {})", system.name, id),
    );

    r.section("SYSTEM DETAILS");
    report::layout(r, &client.get_system_layout(id).await?);
    report::sources(r, &client.get_sources(id).await?);

    r.section("CURRENT PERFORMANCE");
    report::summary(r, &client.get_summary(id).await?);

    r.section("DATA ANALYSIS");
    match client.get_today_data(id).await {
        Ok(today) => report::today(r, &today),
        Err(e) => r.status(Status::Warning, format!("Data analysis error: {}", e)),
    }
    match client.get_date_range_data(id, 7, DataLevel::Day).await {
        Ok(week) => {
            let totals = analysis::power_column(&week)
                .map(|idx| analysis::daily_totals(&week, idx))
                .unwrap_or_default();
            report::weekly(r, &totals);
        }
        Err(e) => r.status(Status::Warning, format!("Data analysis error: {}", e)),
    }

    r.section("SYSTEM EFFICIENCY ANALYSIS");
    match client.calculate_system_efficiency(id, 14).await {
        Ok(efficiency) => report::efficiency(r, &efficiency),
        Err(TigoError::InsufficientData(reason)) => r.status(Status::Error, reason),
        Err(e) => r.status(Status::Warning, format!("Efficiency analysis error: {}", e)),
    }

    r.section("PANEL-LEVEL ANALYSIS");
    match client.get_panel_performance(id, 7).await {
        Ok(panels) => report::panels(r, &panels, 85.0),
        Err(e) => r.status(Status::Warning, format!("Panel analysis error: {}", e)),
    }

    r.section("ALERTS AND MONITORING");
    report::alerts(r, &client.get_alerts(id).await?, false);
    report::alert_types(r, &client.get_alert_types().await?);

    r.section("RAW DATA SAMPLES");
    r.subsection(&format!("Last 24 Hours ({}-minute buckets)", bucket_minutes));
    let now = Local::now().naive_local();
    let range = TimeRange::new(now - TimeDelta::hours(24), now)?;
    match client.get_combined_data(id, &range, DataLevel::Minute).await {
        Ok(series) => {
            let buckets = analysis::power_column(&series)
                .map(|idx| aggregate_buckets(&series, idx, bucket_minutes))
                .unwrap_or_default();
            report::buckets(r, &buckets, bucket_minutes);
        }
        Err(e) => r.status(Status::Warning, format!("Could not fetch minute data: {}", e)),
    }

    r.section("SESSION");
    r.status(Status::Success, "Report complete; logging out");
    Ok(())
}

async fn export_data(client: &TigoClient, system_id: i64, args: &ExportArgs) -> Result<()> {
    let level: DataLevel = args.level.parse()?;
    let now = Local::now().naive_local();
    let range = export::resolve_range(args.start.as_deref(), args.end.as_deref(), args.days, now)?;
    debug!("exporting {:?} data for {} at {} resolution", args.dataset, range, level);

    let series = match args.dataset {
        Dataset::Combined => client.get_combined_data(system_id, &range, level).await?,
        Dataset::Aggregate => {
            let ids = match &args.objects {
                Some(raw) => export::parse_object_ids(raw)?,
                None => client
                    .get_objects(system_id)
                    .await?
                    .into_iter()
                    .filter(|o| o.is_panel())
                    .map(|o| o.id)
                    .collect(),
            };
            let query = AggregateQuery::new(level)
                .with_param(args.param.clone())
                .with_object_ids(ids);
            client.get_aggregate_data(system_id, &range, &query).await?
        }
    };

    if series.is_empty() {
        warn!("no data returned for {}", range);
    }
    export::write_csv(&series, args.output.as_deref())
}
