//! High-level Tigo API client.

use crate::analysis::{self, EfficiencyReport, PanelPerformance};
use crate::range::{DataLevel, TimeRange};
use crate::timeseries::TimeSeries;
use crate::types::{
    AlertList, AlertType, AlertTypesEnvelope, EnergySummary, Layout, LayoutEnvelope,
    ObjectType, ObjectTypesEnvelope, ObjectsEnvelope, Source, SourcesEnvelope, System,
    SystemEnvelope, SystemList, SystemObject, SummaryEnvelope, User, UserEnvelope,
};
use chrono::{Local, NaiveDateTime};
use futures::stream::{self, StreamExt};
use tigo_core::{ApiTransport, Credentials, Result, Session, TigoAuthenticator, TigoConfig, TigoError};
use tracing::{debug, info};

/// Parameters of a `/data/aggregate` request.
///
/// # Examples
///
/// ```
/// use tigo_client::client::AggregateQuery;
/// use tigo_client::range::DataLevel;
///
/// let query = AggregateQuery::new(DataLevel::Minute)
///     .with_param("Pin")
///     .with_object_ids([101, 102]);
///
/// assert_eq!(query.param, "Pin");
/// assert_eq!(query.object_ids, vec![101, 102]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub level: DataLevel,
    /// Measured quantity, e.g. `Pin` (input power) or `Vin`
    pub param: String,
    /// How columns are named: `label` or `key`
    pub header: String,
    /// Objects to include; empty means every object of the system
    pub object_ids: Vec<i64>,
}

impl Default for AggregateQuery {
    fn default() -> Self {
        Self {
            level: DataLevel::Hour,
            param: "Pin".to_string(),
            header: "label".to_string(),
            object_ids: Vec::new(),
        }
    }
}

impl AggregateQuery {
    pub fn new(level: DataLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_object_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.object_ids = ids.into_iter().collect();
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("level", self.level.to_string()),
            ("param", self.param.clone()),
            ("header", self.header.clone()),
        ];
        if !self.object_ids.is_empty() {
            let ids: Vec<String> = self.object_ids.iter().map(i64::to_string).collect();
            params.push(("object_ids", ids.join(",")));
        }
        params
    }
}

/// Typed client for the Tigo Energy v3 API.
///
/// Authentication happens lazily on the first request; call
/// [`login`](Self::login) to fail fast on bad credentials and
/// [`logout`](Self::logout) when done.
///
/// # Examples
///
/// ```no_run
/// use tigo_client::TigoClient;
///
/// # async fn example() -> tigo_client::Result<()> {
/// let client = TigoClient::from_env()?;
/// for system in client.list_all_systems().await? {
///     let summary = client.get_summary(system.system_id).await?;
///     println!("{}: {:.1} kWh today", system.name, summary.daily_energy_kwh());
/// }
/// client.logout().await?;
/// # Ok(())
/// # }
/// ```
pub struct TigoClient {
    transport: ApiTransport,
}

impl TigoClient {
    pub fn new(credentials: Credentials, config: TigoConfig) -> Result<Self> {
        Ok(Self {
            transport: ApiTransport::new(credentials, config)?,
        })
    }

    /// Reads credentials and configuration from `TIGO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(Credentials::from_env()?, TigoConfig::from_env()?)
    }

    /// Reuses a session token obtained elsewhere.
    pub fn with_token(token: impl Into<String>, user_id: i64, config: TigoConfig) -> Result<Self> {
        Ok(Self {
            transport: ApiTransport::with_token(token, user_id, config)?,
        })
    }

    pub fn from_transport(transport: ApiTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &ApiTransport {
        &self.transport
    }

    pub fn authenticator(&self) -> &TigoAuthenticator {
        self.transport.auth()
    }

    pub fn config(&self) -> &TigoConfig {
        self.transport.config()
    }

    /// Logs in immediately instead of on the first request.
    pub async fn login(&self) -> Result<Session> {
        self.authenticator().login().await
    }

    /// Ends the session and drops cached responses.
    pub async fn logout(&self) -> Result<()> {
        self.authenticator().logout().await?;
        self.transport.cache().clear();
        Ok(())
    }

    async fn current_user_id(&self) -> Result<i64> {
        self.authenticator().token().await?;
        self.authenticator()
            .user_id()
            .await
            .ok_or_else(|| TigoError::Auth {
                status: 0,
                message: "no active session".into(),
            })
    }

    /// Account details of the logged-in user.
    pub async fn get_user(&self) -> Result<User> {
        let user_id = self.current_user_id().await?;
        let envelope: UserEnvelope = self
            .transport
            .get_json(&format!("/users/{}", user_id), &[])
            .await?;
        Ok(envelope.user)
    }

    /// One page of the systems visible to the account.
    pub async fn list_systems(&self, page: Option<u32>, limit: Option<u32>) -> Result<SystemList> {
        let mut query = Vec::new();
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.transport.get_json("/systems", &query).await
    }

    /// Every system, following the paging block page by page.
    pub async fn list_all_systems(&self) -> Result<Vec<System>> {
        let mut systems = Vec::new();
        let mut page = 1;
        loop {
            let list = self.list_systems(Some(page), None).await?;
            let fetched = list.systems.len();
            systems.extend(list.systems);

            match list.paging {
                Some(paging) if paging.has_next() && fetched > 0 => {
                    page = paging.current_page + 1;
                }
                _ => break,
            }
        }
        debug!("listed {} systems", systems.len());
        Ok(systems)
    }

    pub async fn get_system(&self, system_id: i64) -> Result<System> {
        let envelope: SystemEnvelope = self
            .transport
            .get_json("/systems/view", &[("id", system_id.to_string())])
            .await?;
        Ok(envelope.system)
    }

    pub async fn get_system_layout(&self, system_id: i64) -> Result<Layout> {
        let envelope: LayoutEnvelope = self
            .transport
            .get_json("/systems/layout", &[("id", system_id.to_string())])
            .await?;
        Ok(envelope.system)
    }

    pub async fn get_sources(&self, system_id: i64) -> Result<Vec<Source>> {
        let envelope: SourcesEnvelope = self
            .transport
            .get_json("/sources/system", &[("system_id", system_id.to_string())])
            .await?;
        Ok(envelope.sources)
    }

    pub async fn get_objects(&self, system_id: i64) -> Result<Vec<SystemObject>> {
        let envelope: ObjectsEnvelope = self
            .transport
            .get_json("/objects/system", &[("system_id", system_id.to_string())])
            .await?;
        Ok(envelope.objects)
    }

    pub async fn get_object_types(&self) -> Result<Vec<ObjectType>> {
        let envelope: ObjectTypesEnvelope = self.transport.get_json("/objects/types", &[]).await?;
        Ok(envelope.object_types)
    }

    pub async fn get_summary(&self, system_id: i64) -> Result<EnergySummary> {
        let envelope: SummaryEnvelope = self
            .transport
            .get_json("/data/summary", &[("system_id", system_id.to_string())])
            .await?;
        Ok(envelope.summary)
    }

    pub async fn get_alerts(&self, system_id: i64) -> Result<AlertList> {
        self.transport
            .get_json("/alerts/system", &[("system_id", system_id.to_string())])
            .await
    }

    pub async fn get_alert_types(&self) -> Result<Vec<AlertType>> {
        let envelope: AlertTypesEnvelope = self.transport.get_json("/alerts/types", &[]).await?;
        Ok(envelope.alert_types)
    }

    /// System-level CSV from `/data/combined` for a single request window.
    pub async fn get_combined_data_raw(
        &self,
        system_id: i64,
        range: &TimeRange,
        level: DataLevel,
    ) -> Result<String> {
        self.fetch_csv("/data/combined", system_id, range, &[("agg", level.to_string())])
            .await
    }

    /// System-level time series, split into as many requests as `level` needs.
    pub async fn get_combined_data(
        &self,
        system_id: i64,
        range: &TimeRange,
        level: DataLevel,
    ) -> Result<TimeSeries> {
        self.fetch_series("/data/combined", system_id, range, level, &[("agg", level.to_string())])
            .await
    }

    /// Object-level CSV from `/data/aggregate` for a single request window.
    pub async fn get_aggregate_data_raw(
        &self,
        system_id: i64,
        range: &TimeRange,
        query: &AggregateQuery,
    ) -> Result<String> {
        self.fetch_csv("/data/aggregate", system_id, range, &query.params())
            .await
    }

    /// Object-level time series with one column per object.
    pub async fn get_aggregate_data(
        &self,
        system_id: i64,
        range: &TimeRange,
        query: &AggregateQuery,
    ) -> Result<TimeSeries> {
        self.fetch_series("/data/aggregate", system_id, range, query.level, &query.params())
            .await
    }

    /// Hourly combined data from local midnight until now.
    pub async fn get_today_data(&self, system_id: i64) -> Result<TimeSeries> {
        let range = TimeRange::today(local_now());
        self.get_combined_data(system_id, &range, DataLevel::Hour)
            .await
    }

    /// Combined data for the last `days_back` days.
    pub async fn get_date_range_data(
        &self,
        system_id: i64,
        days_back: u32,
        level: DataLevel,
    ) -> Result<TimeSeries> {
        let range = TimeRange::days_back(local_now(), days_back)?;
        self.get_combined_data(system_id, &range, level).await
    }

    /// Efficiency of a system over the last `days_back` days of hourly data.
    pub async fn calculate_system_efficiency(
        &self,
        system_id: i64,
        days_back: u32,
    ) -> Result<EfficiencyReport> {
        let system = self.get_system(system_id).await?;
        let series = self
            .get_date_range_data(system_id, days_back, DataLevel::Hour)
            .await?;
        let column = analysis::power_column(&series).ok_or_else(|| {
            TigoError::InsufficientData(format!("no power data for system {}", system_id))
        })?;

        let report = analysis::system_efficiency(
            &series,
            column,
            system.power_rating,
            days_back,
            DataLevel::Hour,
        )?;
        info!(
            "system {} efficiency {:.1}% over {} days",
            system_id, report.average_efficiency_percent, days_back
        );
        Ok(report)
    }

    /// Hourly input power of every panel, ranked best first.
    pub async fn get_panel_performance(
        &self,
        system_id: i64,
        days_back: u32,
    ) -> Result<Vec<PanelPerformance>> {
        let panel_ids: Vec<i64> = self
            .get_objects(system_id)
            .await?
            .iter()
            .filter(|o| o.is_panel())
            .map(|o| o.id)
            .collect();
        if panel_ids.is_empty() {
            return Err(TigoError::NotFound(format!(
                "no panels reported for system {}",
                system_id
            )));
        }

        let range = TimeRange::days_back(local_now(), days_back)?;
        let query = AggregateQuery::new(DataLevel::Hour).with_object_ids(panel_ids);
        let series = self.get_aggregate_data(system_id, &range, &query).await?;
        Ok(analysis::panel_performance(&series))
    }

    /// Panels whose relative efficiency is below `threshold_percent`.
    pub async fn find_underperforming_panels(
        &self,
        system_id: i64,
        threshold_percent: f64,
        days_back: u32,
    ) -> Result<Vec<PanelPerformance>> {
        let panels = self.get_panel_performance(system_id, days_back).await?;
        Ok(analysis::underperforming(&panels, threshold_percent))
    }

    async fn fetch_csv(
        &self,
        path: &str,
        system_id: i64,
        range: &TimeRange,
        extra: &[(&str, String)],
    ) -> Result<String> {
        let mut query = vec![
            ("system_id", system_id.to_string()),
            ("start", range.start_param()),
            ("end", range.end_param()),
        ];
        query.extend(extra.iter().cloned());
        self.transport.get_text(path, &query).await
    }

    async fn fetch_series(
        &self,
        path: &str,
        system_id: i64,
        range: &TimeRange,
        level: DataLevel,
        extra: &[(&str, String)],
    ) -> Result<TimeSeries> {
        let chunks = range.split(level.max_span(&self.config().limits));
        if chunks.len() > 1 {
            debug!(
                "splitting {} ({}) into {} requests to {}",
                range,
                level,
                chunks.len(),
                path
            );
        }

        let parts: Vec<Result<TimeSeries>> = stream::iter(chunks.iter().map(|chunk| async move {
            let text = self.fetch_csv(path, system_id, chunk, extra).await?;
            TimeSeries::parse_csv(&text)
        }))
        .buffered(self.config().fetch_concurrency.max(1))
        .collect()
        .await;

        let mut merged: Option<TimeSeries> = None;
        for part in parts {
            let part = part?;
            merged = Some(match merged {
                Some(acc) => acc.concat(part),
                None => part,
            });
        }
        Ok(merged.unwrap_or_default())
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> TigoClient {
        let config = TigoConfig {
            retry_backoff_ms: 1,
            ..TigoConfig::default()
        }
        .with_base_url(server.url());
        TigoClient::with_token("tok", 42, config).unwrap()
    }

    fn june(day: u32, hour: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_aggregate_query_params() {
        let query = AggregateQuery::new(DataLevel::Minute).with_object_ids([5, 6]);
        assert_eq!(
            query.params(),
            vec![
                ("level", "minute".to_string()),
                ("param", "Pin".to_string()),
                ("header", "label".to_string()),
                ("object_ids", "5,6".to_string()),
            ]
        );
        assert_eq!(AggregateQuery::default().params().len(), 3);
    }

    #[tokio::test]
    async fn test_get_user_uses_session_user_id() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/42")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"user": {"user_id": 42, "first_name": "Grace", "last_name": "Hopper"}}"#)
            .create_async()
            .await;

        let user = client_for(&server).get_user().await.unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.full_name(), "Grace Hopper");
    }

    #[tokio::test]
    async fn test_list_all_systems_follows_paging() {
        let mut server = mockito::Server::new_async().await;
        let _p1 = server
            .mock("GET", "/systems")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"systems": [{"system_id": 1, "name": "Barn"}],
                    "paging": {"currentPage": 1, "pageCount": 2, "totalCount": 2, "perPage": 1}}"#,
            )
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/systems")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(
                r#"{"systems": [{"system_id": 2, "name": "House"}],
                    "paging": {"currentPage": 2, "pageCount": 2, "totalCount": 2, "perPage": 1}}"#,
            )
            .create_async()
            .await;

        let systems = client_for(&server).list_all_systems().await.unwrap();
        let names: Vec<_> = systems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Barn", "House"]);
    }

    #[tokio::test]
    async fn test_get_system_and_summary() {
        let mut server = mockito::Server::new_async().await;
        let _system = server
            .mock("GET", "/systems/view")
            .match_query(Matcher::UrlEncoded("id".into(), "7".into()))
            .with_status(200)
            .with_body(r#"{"system": {"system_id": 7, "name": "Roof", "power_rating": 6400}}"#)
            .create_async()
            .await;
        let _summary = server
            .mock("GET", "/data/summary")
            .match_query(Matcher::UrlEncoded("system_id".into(), "7".into()))
            .with_status(200)
            .with_body(r#"{"summary": {"daily_energy_dc": 21000, "last_power_dc": 3100}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let system = client.get_system(7).await.unwrap();
        assert_eq!(system.power_rating_kw(), 6.4);

        let summary = client.get_summary(7).await.unwrap();
        assert_eq!(summary.daily_energy_kwh(), 21.0);
        assert_eq!(summary.last_power_kw(), 3.1);
    }

    #[tokio::test]
    async fn test_get_objects_marks_panels() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/objects/system")
            .match_query(Matcher::UrlEncoded("system_id".into(), "7".into()))
            .with_status(200)
            .with_body(
                r#"{"objects": [
                    {"id": 10, "label": "Inverter", "object_type_id": 1},
                    {"id": 11, "label": "A1", "object_type_id": 2, "parent_id": 10}
                ]}"#,
            )
            .create_async()
            .await;

        let objects = client_for(&server).get_objects(7).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects.iter().filter(|o| o.is_panel()).count(), 1);
    }

    #[tokio::test]
    async fn test_combined_data_sends_range_and_level() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("system_id".into(), "7".into()),
                Matcher::UrlEncoded("start".into(), "2024-06-01T06:00:00".into()),
                Matcher::UrlEncoded("end".into(), "2024-06-01T09:00:00".into()),
                Matcher::UrlEncoded("agg".into(), "hour".into()),
            ]))
            .with_status(200)
            .with_body("Datetime,Pin\n2024/06/01 06:00:00,10\n2024/06/01 07:00:00,250\n")
            .create_async()
            .await;

        let range = TimeRange::new(june(1, 6), june(1, 9)).unwrap();
        let series = client_for(&server)
            .get_combined_data(7, &range, DataLevel::Hour)
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.column("Pin"), Some(vec![10.0, 250.0]));
    }

    #[tokio::test]
    async fn test_combined_data_splits_long_minute_ranges() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::UrlEncoded("start".into(), "2024-06-01T00:00:00".into()))
            .with_status(200)
            .with_body("Datetime,Pin\n2024/06/01 12:00:00,100\n")
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::UrlEncoded("start".into(), "2024-06-02T00:00:00".into()))
            .with_status(200)
            .with_body("Datetime,Pin\n2024/06/02 12:00:00,200\n")
            .expect(1)
            .create_async()
            .await;

        let range = TimeRange::new(june(1, 0), june(3, 0)).unwrap();
        let series = client_for(&server)
            .get_combined_data(7, &range, DataLevel::Minute)
            .await
            .unwrap();

        assert_eq!(series.column("Pin"), Some(vec![100.0, 200.0]));
        assert_eq!(series.first_timestamp(), Some(june(1, 12)));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_combined_data_propagates_csv_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("Datetime,Pin\nnot-a-date,1\n")
            .create_async()
            .await;

        let range = TimeRange::new(june(1, 0), june(1, 6)).unwrap();
        let err = client_for(&server)
            .get_combined_data(7, &range, DataLevel::Hour)
            .await
            .unwrap_err();
        assert!(matches!(err, TigoError::Csv { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_aggregate_data_raw_passes_object_ids() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data/aggregate")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("level".into(), "minute".into()),
                Matcher::UrlEncoded("param".into(), "Pin".into()),
                Matcher::UrlEncoded("object_ids".into(), "11,12".into()),
            ]))
            .with_status(200)
            .with_body("Datetime,A1,A2\n2024/06/01 10:00:00,200,180\n")
            .create_async()
            .await;

        let range = TimeRange::new(june(1, 10), june(1, 11)).unwrap();
        let query = AggregateQuery::new(DataLevel::Minute).with_object_ids([11, 12]);
        let csv = client_for(&server)
            .get_aggregate_data_raw(7, &range, &query)
            .await
            .unwrap();
        assert!(csv.starts_with("Datetime,A1,A2"));
    }

    #[tokio::test]
    async fn test_panel_performance_without_panels() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/objects/system")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"objects": [{"id": 10, "label": "Inverter", "object_type_id": 1}]}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .get_panel_performance(7, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, TigoError::NotFound(_)));
    }

    async fn mock_system(server: &mut mockito::Server, rating: u32) -> mockito::Mock {
        server
            .mock("GET", "/systems/view")
            .match_query(Matcher::UrlEncoded("id".into(), "7".into()))
            .with_status(200)
            .with_body(format!(
                r#"{{"system": {{"system_id": 7, "name": "Roof", "power_rating": {}}}}}"#,
                rating
            ))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_calculate_system_efficiency() {
        let mut server = mockito::Server::new_async().await;
        let _system = mock_system(&mut server, 5000).await;
        let _data = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("system_id".into(), "7".into()),
                Matcher::UrlEncoded("agg".into(), "hour".into()),
            ]))
            .with_status(200)
            .with_body(
                "Datetime,Voltage,Power\n\
                 2024/06/01 10:00:00,48,3000\n\
                 2024/06/01 11:00:00,49,4000\n\
                 2024/06/01 22:00:00,0,0\n",
            )
            .expect(1)
            .create_async()
            .await;

        let report = client_for(&server)
            .calculate_system_efficiency(7, 1)
            .await
            .unwrap();

        assert_eq!(report.rated_power_dc, 5000.0);
        assert_eq!(report.peak_power, 4000.0);
        assert!((report.average_efficiency_percent - 70.0).abs() < 1e-9);
        assert_eq!(report.samples, 3);
        assert!((report.capacity_factor - 7000.0 / 1200.0).abs() < 1e-9);
        assert_eq!(
            analysis::Rating::from_efficiency(report.average_efficiency_percent),
            analysis::Rating::Good
        );
    }

    #[tokio::test]
    async fn test_efficiency_without_rating_is_insufficient_data() {
        let mut server = mockito::Server::new_async().await;
        let _system = mock_system(&mut server, 0).await;
        let _data = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("Datetime,Power\n2024/06/01 10:00:00,3000\n")
            .create_async()
            .await;

        let err = client_for(&server)
            .calculate_system_efficiency(7, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TigoError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_today_data_starts_at_midnight() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("agg".into(), "hour".into()),
                Matcher::Regex(r"start=\d{4}-\d{2}-\d{2}T00%3A00%3A00".into()),
            ]))
            .with_status(200)
            .with_body("Datetime,Power\n2024/06/01 09:00:00,1500\n")
            .expect(1)
            .create_async()
            .await;

        let series = client_for(&server).get_today_data(7).await.unwrap();
        assert_eq!(series.column("Power"), Some(vec![1500.0]));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_date_range_data_uses_level() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/data/combined")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("system_id".into(), "7".into()),
                Matcher::UrlEncoded("agg".into(), "day".into()),
            ]))
            .with_status(200)
            .with_body("Datetime,Power\n2024/06/01 00:00:00,21000\n2024/06/02 00:00:00,19000\n")
            .expect(1)
            .create_async()
            .await;

        let series = client_for(&server)
            .get_date_range_data(7, 3, DataLevel::Day)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        m.assert_async().await;

        let err = client_for(&server)
            .get_date_range_data(7, 0, DataLevel::Day)
            .await
            .unwrap_err();
        assert!(matches!(err, TigoError::InvalidTimeRange { .. }));
    }

    #[tokio::test]
    async fn test_get_sources() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/sources/system")
            .match_query(Matcher::UrlEncoded("system_id".into(), "7".into()))
            .with_status(200)
            .with_body(
                r#"{"sources": [{"source_id": 3, "name": "CCA", "serial": "04C05B", "panel_count": 18}]}"#,
            )
            .create_async()
            .await;

        let sources = client_for(&server).get_sources(7).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].serial, "04C05B");
        assert_eq!(sources[0].panel_count, 18);
    }

    #[tokio::test]
    async fn test_get_object_types() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/objects/types")
            .with_status(200)
            .with_body(
                r#"{"object_types": [{"object_type_id": 1, "name": "Inverter"}, {"id": 2, "name": "Panel"}]}"#,
            )
            .create_async()
            .await;

        let types = client_for(&server).get_object_types().await.unwrap();
        let names: Vec<_> = types.iter().map(|t| (t.id, t.name.as_str())).collect();
        assert_eq!(names, vec![(1, "Inverter"), (2, "Panel")]);
    }

    #[tokio::test]
    async fn test_get_alerts_splits_active() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/alerts/system")
            .match_query(Matcher::UrlEncoded("system_id".into(), "7".into()))
            .with_status(200)
            .with_body(
                r#"{"alerts": [
                    {"alert_id": 1, "title": "Panel offline", "archived": false},
                    {"alert_id": 2, "title": "Gateway offline", "archived": true}
                ]}"#,
            )
            .create_async()
            .await;

        let alerts = client_for(&server).get_alerts(7).await.unwrap();
        assert_eq!(alerts.alerts.len(), 2);
        let active: Vec<_> = alerts.active().map(|a| a.title.as_str()).collect();
        assert_eq!(active, vec!["Panel offline"]);
    }

    #[tokio::test]
    async fn test_chunks_concatenate_in_order_beyond_concurrency() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for day in 1..=5u32 {
            let mock = server
                .mock("GET", "/data/combined")
                .match_query(Matcher::UrlEncoded(
                    "start".into(),
                    format!("2024-06-{:02}T00:00:00", day),
                ))
                .with_status(200)
                .with_body(format!("Datetime,Pin\n2024/06/{:02} 12:00:00,{}\n", day, day * 100))
                .expect(1)
                .create_async()
                .await;
            mocks.push(mock);
        }

        let config = TigoConfig {
            fetch_concurrency: 2,
            ..TigoConfig::default()
        }
        .with_base_url(server.url());
        let client = TigoClient::with_token("tok", 42, config).unwrap();

        let range = TimeRange::new(june(1, 0), june(6, 0)).unwrap();
        let series = client
            .get_combined_data(7, &range, DataLevel::Minute)
            .await
            .unwrap();

        assert_eq!(
            series.column("Pin"),
            Some(vec![100.0, 200.0, 300.0, 400.0, 500.0])
        );
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let mut server = mockito::Server::new_async().await;
        let _types = server
            .mock("GET", "/alerts/types")
            .with_status(200)
            .with_body(r#"{"alert_types": [{"unique_id": 3, "title": "Gateway offline"}]}"#)
            .create_async()
            .await;
        let _logout = server
            .mock("GET", "/users/logout")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        let types = client.get_alert_types().await.unwrap();
        assert_eq!(types[0].title, "Gateway offline");
        assert!(!client.transport().cache().is_empty());

        client.logout().await.unwrap();
        assert!(client.transport().cache().is_empty());
        assert!(!client.authenticator().is_authenticated().await);
    }
}
