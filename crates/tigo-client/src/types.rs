//! Response models for the Tigo v3 API.
//!
//! The API is loose about optional fields, so everything that is not needed
//! to identify a record defaults when absent.

use serde::{Deserialize, Serialize};

/// Object type id the API uses for panel-level (TS4/optimizer) objects.
pub const PANEL_OBJECT_TYPE: i64 = 2;

/// Account details from `/users/{user_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default, rename = "systemCount", alias = "system_count")]
    pub system_count: u32,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

/// A monitored installation as listed by `/systems`.
///
/// # Examples
///
/// ```
/// use tigo_client::types::System;
///
/// let json = r#"{
///     "system_id": 12345,
///     "name": "Home Array",
///     "city": "Austin",
///     "state": "TX",
///     "power_rating": 8200,
///     "status": "Active"
/// }"#;
///
/// let system: System = serde_json::from_str(json).unwrap();
/// assert_eq!(system.system_id, 12345);
/// assert_eq!(system.power_rating_kw(), 8.2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub system_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// DC power rating in watts
    #[serde(default)]
    pub power_rating: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub turn_on_date: Option<String>,
}

impl System {
    pub fn power_rating_kw(&self) -> f64 {
        self.power_rating / 1000.0
    }

    pub fn location(&self) -> String {
        match (self.city.is_empty(), self.state.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.state),
            (false, true) => self.city.clone(),
            (true, false) => self.state.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SystemEnvelope {
    pub system: System,
}

/// Paging block attached to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default, alias = "currentPage")]
    pub current_page: u32,
    #[serde(default, alias = "pageCount")]
    pub page_count: u32,
    #[serde(default, alias = "totalCount")]
    pub total_count: u32,
    #[serde(default, alias = "perPage")]
    pub per_page: u32,
}

impl Paging {
    pub fn has_next(&self) -> bool {
        self.current_page > 0 && self.current_page < self.page_count
    }
}

/// One page of `/systems`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemList {
    #[serde(default)]
    pub systems: Vec<System>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Physical layout from `/systems/layout`: inverters → MPPTs → strings → panels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub system_id: Option<i64>,
    #[serde(default)]
    pub inverters: Vec<Inverter>,
}

impl Layout {
    pub fn panel_count(&self) -> usize {
        self.inverters.iter().map(Inverter::panel_count).sum()
    }

    pub fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.inverters
            .iter()
            .flat_map(|i| i.mppts.iter())
            .flat_map(|m| m.strings.iter())
            .flat_map(|s| s.panels.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LayoutEnvelope {
    pub system: Layout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inverter {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub mppts: Vec<Mppt>,
}

impl Inverter {
    pub fn panel_count(&self) -> usize {
        self.mppts
            .iter()
            .flat_map(|m| m.strings.iter())
            .map(|s| s.panels.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mppt {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub strings: Vec<PanelString>,
}

/// A series-connected string of panels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelString {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub serial: Option<String>,
}

/// A data source (gateway / CCA) reporting for a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub last_checkin: Option<String>,
    #[serde(default)]
    pub control_state: Option<String>,
    #[serde(default)]
    pub panel_count: u32,
    #[serde(default)]
    pub gateway_count: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SourcesEnvelope {
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// A monitored object (inverter, string, panel, ...) from `/objects/system`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemObject {
    pub id: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_type_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub datasource: Option<String>,
}

impl SystemObject {
    pub fn is_panel(&self) -> bool {
        self.object_type_id == PANEL_OBJECT_TYPE
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ObjectsEnvelope {
    #[serde(default)]
    pub objects: Vec<SystemObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    #[serde(alias = "object_type_id")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ObjectTypesEnvelope {
    #[serde(default)]
    pub object_types: Vec<ObjectType>,
}

/// Production totals from `/data/summary`. Energy in Wh, power in W.
///
/// # Examples
///
/// ```
/// use tigo_client::types::EnergySummary;
///
/// let summary: EnergySummary = serde_json::from_str(r#"{
///     "lifetime_energy_dc": 48250000,
///     "daily_energy_dc": 31500,
///     "last_power_dc": 5120,
///     "updated_on": "2024-06-01T14:05:00"
/// }"#).unwrap();
///
/// assert_eq!(summary.daily_energy_kwh(), 31.5);
/// assert_eq!(summary.ytd_energy_dc, 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lifetime_energy_dc: f64,
    #[serde(default)]
    pub daily_energy_dc: f64,
    #[serde(default)]
    pub ytd_energy_dc: f64,
    #[serde(default)]
    pub last_power_dc: f64,
    #[serde(default)]
    pub updated_on: Option<String>,
}

impl EnergySummary {
    pub fn lifetime_energy_kwh(&self) -> f64 {
        self.lifetime_energy_dc / 1000.0
    }

    pub fn daily_energy_kwh(&self) -> f64 {
        self.daily_energy_dc / 1000.0
    }

    pub fn ytd_energy_kwh(&self) -> f64 {
        self.ytd_energy_dc / 1000.0
    }

    pub fn last_power_kw(&self) -> f64 {
        self.last_power_dc / 1000.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SummaryEnvelope {
    pub summary: EnergySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub alert_id: Option<i64>,
    #[serde(default)]
    pub system_id: Option<i64>,
    #[serde(default)]
    pub unique_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub generated: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

/// One page of `/alerts/system`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertList {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl AlertList {
    /// Alerts that have not been archived.
    pub fn active(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.archived)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertType {
    #[serde(default, alias = "alert_type_id")]
    pub unique_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AlertTypesEnvelope {
    #[serde(default)]
    pub alert_types: Vec<AlertType>,
}
