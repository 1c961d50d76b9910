//! Typed client and production analytics for the Tigo Energy monitoring API.
//!
//! - [`TigoClient`]: account, system, layout, alert and telemetry endpoints
//! - [`TimeSeries`]: the CSV tables returned by the data endpoints
//! - [`analysis`]: bucketing, efficiency and per-panel ranking
//!
//! # Examples
//!
//! ```no_run
//! use tigo_client::{DataLevel, TigoClient};
//! use tigo_client::analysis::{aggregate_buckets, summarize_buckets};
//!
//! # async fn example() -> tigo_client::Result<()> {
//! let client = TigoClient::from_env()?;
//! let systems = client.list_all_systems().await?;
//! let system = &systems[0];
//!
//! let today = client.get_today_data(system.system_id).await?;
//! let buckets = aggregate_buckets(&today, 0, 60);
//! if let Some(summary) = summarize_buckets(&buckets, 60) {
//!     println!("{} produced {:.2} kWh", system.name, summary.energy_kwh);
//! }
//!
//! let report = client.calculate_system_efficiency(system.system_id, 14).await?;
//! println!("capacity factor {:.1}%", report.capacity_factor);
//! # let _ = DataLevel::Hour;
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod client;
pub mod range;
pub mod timeseries;
pub mod types;

pub use analysis::{EfficiencyReport, PanelPerformance, Rating};
pub use client::{AggregateQuery, TigoClient};
pub use range::{DataLevel, TimeRange};
pub use timeseries::TimeSeries;
pub use types::{
    Alert, AlertList, AlertType, EnergySummary, Layout, ObjectType, Paging, Panel, Source, System,
    SystemList, SystemObject, User,
};

pub use tigo_core::{Credentials, Result, TigoConfig, TigoError};
