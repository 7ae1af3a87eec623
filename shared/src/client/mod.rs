//! Signed, throttled HTTP client for the cloud Open API.
//!
//! All endpoints share the same conventions: a signed header set (see
//! [`signing`]), a JSON envelope with an `errno` field, and a rate
//! limit that rejects rapid queries. The client enforces a minimum gap
//! between queries to the same path so bulk date-range fetches stay
//! inside the limit.

pub mod signing;

use crate::config::{Config, USER_AGENT};
use crate::daterange::{self, DateRangeError};
use crate::models::{
    ApiResponse, DeviceDetail, DeviceSummary, Dimension, GenerationTotals, HistorySeries, Paged,
    ReportSeries, ReportVariable, Variable,
};
use crate::models::variable::VariableEntry;
use chrono::{Datelike, Local, NaiveDate, Timelike, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Errors that can occur while talking to the cloud.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The cloud answered with a non-success HTTP status.
    #[error("{path} returned HTTP {status}")]
    Status {
        /// Request path.
        path: String,
        /// HTTP status received.
        status: reqwest::StatusCode,
    },

    /// The cloud reported an application-level error number.
    #[error("{path} failed: errno {errno}: {message}")]
    Errno {
        /// Request path.
        path: String,
        /// Cloud error number.
        errno: i64,
        /// Resolved error message, or "unknown error".
        message: String,
    },

    /// The envelope reported success but carried no payload.
    #[error("{path} returned no result data")]
    MissingResult {
        /// Request path.
        path: String,
    },

    /// A requested history variable is not in the cloud's catalogue.
    #[error("Invalid variable '{0}'; run the variable listing to see what the device offers")]
    InvalidVariable(String),

    /// No device matched the requested serial number.
    #[error("No device matching '{wanted}'. Available: {available}")]
    UnknownDevice {
        /// The serial (or prefix) asked for.
        wanted: String,
        /// Serial numbers on the account.
        available: String,
    },

    /// The device list endpoint returned an implausible total.
    #[error("Invalid device list returned: total = {0}")]
    InvalidDeviceList(u32),

    /// A credential or header value could not be used.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// Date handling failed.
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
}

/// Error message catalogue payload: localized text per error number.
#[derive(Debug, Clone, Default, Deserialize)]
struct MessageCatalogue {
    #[serde(default)]
    messages: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalogue {
    fn lookup(&self, lang: &str, errno: i64) -> Option<&str> {
        self.messages
            .get(lang)
            .and_then(|m| m.get(&errno.to_string()))
            .map(String::as_str)
    }
}

#[derive(Deserialize)]
struct HistoryPage {
    #[serde(default)]
    datas: Vec<HistorySeries>,
}

/// Client for the cloud Open API.
pub struct CloudClient {
    http: reqwest::Client,
    config: Config,
    last_query: Mutex<HashMap<String, Instant>>,
    messages: Mutex<Option<MessageCatalogue>>,
    catalogue: Mutex<Option<Vec<Variable>>>,
}

impl CloudClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config,
            last_query: Mutex::new(HashMap::new()),
            messages: Mutex::new(None),
            catalogue: Mutex::new(None),
        })
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lists the raw variables the device can report, with names
    /// resolved in the configured language.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the envelope fails.
    pub async fn variables(&self) -> Result<Vec<Variable>, ApiError> {
        {
            let cached = self.catalogue.lock().await;
            if let Some(vars) = cached.as_ref() {
                return Ok(vars.clone());
            }
        }
        self.ensure_messages().await;
        let entries: Vec<VariableEntry> = self
            .get_json("/op/v0/device/variable/get", &[], false)
            .await?;
        let vars = Variable::from_entries(&entries, &self.config.lang);
        *self.catalogue.lock().await = Some(vars.clone());
        Ok(vars)
    }

    /// Lists the inverters on the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the list total is
    /// implausible (0, or more than one page).
    pub async fn device_list(&self) -> Result<Vec<DeviceSummary>, ApiError> {
        let body = json!({"pageSize": 100, "currentPage": 1});
        let paged: Paged<DeviceSummary> = self.post_json("/op/v0/device/list", &body).await?;
        if paged.total == 0 || paged.total > 100 {
            return Err(ApiError::InvalidDeviceList(paged.total));
        }
        Ok(paged.data)
    }

    /// Resolves a device serial number from an optional prefix, falling
    /// back to the configured serial and then to the account's only
    /// device.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::UnknownDevice`] when no single device
    /// matches; the error lists the serials available.
    pub async fn resolve_device(&self, wanted: Option<&str>) -> Result<String, ApiError> {
        let wanted = wanted.or(self.config.device_sn.as_deref());
        // A full 15-character serial needs no lookup.
        if let Some(sn) = wanted {
            if sn.len() == 15 {
                return Ok(sn.to_string());
            }
        }
        let devices = self.device_list().await?;
        match wanted {
            Some(prefix) => devices
                .iter()
                .find(|d| {
                    d.device_sn
                        .to_uppercase()
                        .starts_with(&prefix.to_uppercase())
                })
                .map(|d| d.device_sn.clone())
                .ok_or_else(|| ApiError::UnknownDevice {
                    wanted: prefix.to_string(),
                    available: serials(&devices),
                }),
            None if devices.len() == 1 => Ok(devices[0].device_sn.clone()),
            None => Err(ApiError::UnknownDevice {
                wanted: "(none)".to_string(),
                available: serials(&devices),
            }),
        }
    }

    /// Fetches detail for one device.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the envelope fails.
    pub async fn device_detail(&self, sn: &str) -> Result<DeviceDetail, ApiError> {
        self.get_json("/op/v0/device/detail", &[("sn", sn.to_string())], false)
            .await
    }

    /// Fetches generation totals (today / month / cumulative) for one
    /// device.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the envelope fails.
    pub async fn generation(&self, sn: &str) -> Result<GenerationTotals, ApiError> {
        self.get_json("/op/v0/device/generation", &[("sn", sn.to_string())], false)
            .await
    }

    /// Fetches raw history series for the given variables over one day.
    /// Variables are validated against the catalogue first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidVariable`] for an unknown variable,
    /// or a request/envelope error.
    pub async fn history(
        &self,
        sn: &str,
        date: NaiveDate,
        variables: &[&str],
    ) -> Result<Vec<HistorySeries>, ApiError> {
        let catalogue = self.variables().await?;
        for wanted in variables {
            if !catalogue.iter().any(|v| v.variable == *wanted) {
                return Err(ApiError::InvalidVariable((*wanted).to_string()));
            }
        }

        let (begin, end) = daterange::day_window(date)?;
        let body = json!({
            "sn": sn,
            "variables": variables,
            "begin": begin,
            "end": end,
        });
        let path = "/op/v0/device/history/query";
        let pages: Vec<HistoryPage> = self.post_json(path, &body).await?;
        let series = pages.into_iter().next().map(|p| p.datas).unwrap_or_default();
        if series.is_empty() {
            return Err(ApiError::MissingResult {
                path: path.to_string(),
            });
        }
        Ok(series)
    }

    /// Fetches a production report. Corrupted values are repaired and
    /// the current partial day/month/year is pruned to complete
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the envelope fails.
    pub async fn report(
        &self,
        sn: &str,
        dimension: Dimension,
        date: NaiveDate,
        variables: &[ReportVariable],
    ) -> Result<Vec<ReportSeries>, ApiError> {
        let names: Vec<&str> = variables.iter().map(ReportVariable::as_str).collect();
        let body = json!({
            "sn": sn,
            "dimension": dimension.as_str(),
            "variables": names,
            "year": date.year(),
            "month": date.month(),
            "day": date.day(),
        });
        let mut series: Vec<ReportSeries> = self
            .post_json("/op/v0/device/report/query", &body)
            .await?;

        let now = Local::now();
        let prune = prune_len(dimension, date, now.date_naive(), now.hour());
        for s in &mut series {
            s.fix_values();
            if let Some(len) = prune {
                s.prune(len);
            }
        }
        Ok(series)
    }

    /// Fetches authoritative whole-day energy totals for one date.
    ///
    /// The hourly day report under-counts slightly, so the total is
    /// taken from the day's entry in the month-dimension report
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the envelope fails.
    pub async fn report_day_totals(
        &self,
        sn: &str,
        date: NaiveDate,
        variables: &[ReportVariable],
    ) -> Result<Vec<(ReportVariable, f64)>, ApiError> {
        let series = self.report(sn, Dimension::Month, date, variables).await?;
        let day_index = date.day() as usize - 1;
        let mut totals = Vec::with_capacity(variables.len());
        for (variable, s) in variables.iter().zip(&series) {
            let total = s.values.get(day_index).map_or_else(
                || {
                    warn!(variable = %variable, %date, "no report entry for day; using 0");
                    0.0
                },
                |v| v.value,
            );
            totals.push((*variable, total));
        }
        Ok(totals)
    }

    /// Fetches the error-message catalogue if it has not been loaded.
    /// Failures are logged and ignored; errno resolution falls back to
    /// the raw number.
    async fn ensure_messages(&self) {
        let mut cached = self.messages.lock().await;
        if cached.is_some() {
            return;
        }
        match self
            .get_json::<MessageCatalogue>("/c/v0/errors/message", &[], true)
            .await
        {
            Ok(catalogue) => *cached = Some(catalogue),
            Err(e) => {
                warn!(error = %e, "could not load error message catalogue");
                *cached = Some(MessageCatalogue::default());
            }
        }
    }

    async fn resolve_errno(&self, errno: i64, msg: Option<String>) -> String {
        if let Some(msg) = msg {
            return msg;
        }
        let cached = self.messages.lock().await;
        cached
            .as_ref()
            .and_then(|c| c.lookup(&self.config.lang, errno))
            .unwrap_or("unknown error")
            .to_string()
    }

    /// Enforces the per-path minimum gap for query endpoints. The map
    /// stays unlocked while sleeping, so queries to other paths are not
    /// held up behind the wait.
    async fn throttle(&self, path: &str) {
        if !path.contains("query") {
            return;
        }
        let wait = {
            let last = self.last_query.lock().await;
            last.get(path)
                .and_then(|prev| self.config.query_delay.checked_sub(prev.elapsed()))
        };
        if let Some(wait) = wait.filter(|w| !w.is_zero()) {
            debug!(path, ?wait, "throttling query");
            time::sleep(wait).await;
        }
        self.last_query
            .lock()
            .await
            .insert(path.to_string(), Instant::now());
    }

    fn signed_headers(&self, path: &str, login: bool) -> Result<HeaderMap, ApiError> {
        let token = if login { "" } else { self.config.api_key.as_str() };
        let timestamp = Utc::now().timestamp_millis();

        let mut headers = HeaderMap::new();
        headers.insert(
            "Token",
            HeaderValue::from_str(token).map_err(|_| ApiError::InvalidHeader("Token"))?,
        );
        headers.insert(
            "Lang",
            HeaderValue::from_str(&self.config.lang).map_err(|_| ApiError::InvalidHeader("Lang"))?,
        );
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            "Timezone",
            HeaderValue::from_str(&self.config.time_zone)
                .map_err(|_| ApiError::InvalidHeader("Timezone"))?,
        );
        headers.insert(
            "Timestamp",
            HeaderValue::from_str(&timestamp.to_string())
                .map_err(|_| ApiError::InvalidHeader("Timestamp"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !login {
            let sig = signing::signature(path, token, timestamp);
            headers.insert(
                "Signature",
                HeaderValue::from_str(&sig).map_err(|_| ApiError::InvalidHeader("Signature"))?,
            );
        }
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        login: bool,
    ) -> Result<T, ApiError> {
        self.throttle(path).await;
        let url = format!("{}{}", self.config.api_domain, path);
        debug!(path, "GET");
        let response = self
            .http
            .get(&url)
            .headers(self.signed_headers(path, login)?)
            .query(query)
            .send()
            .await?;
        self.parse(path, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        self.throttle(path).await;
        let url = format!("{}{}", self.config.api_domain, path);
        debug!(path, "POST");
        let response = self
            .http
            .post(&url)
            .headers(self.signed_headers(path, false)?)
            .json(body)
            .send()
            .await?;
        self.parse(path, response).await
    }

    async fn parse<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
            });
        }
        let envelope: ApiResponse<T> = response.json().await?;
        if envelope.errno != 0 {
            let message = self.resolve_errno(envelope.errno, envelope.msg).await;
            return Err(ApiError::Errno {
                path: path.to_string(),
                errno: envelope.errno,
                message,
            });
        }
        envelope.result.ok_or_else(|| ApiError::MissingResult {
            path: path.to_string(),
        })
    }
}

fn serials(devices: &[DeviceSummary]) -> String {
    if devices.is_empty() {
        return "(no devices)".to_string();
    }
    devices
        .iter()
        .map(|d| format!("{} ({})", d.device_sn, d.device_type))
        .collect::<Vec<_>>()
        .join(", ")
}

/// How many leading entries of a report are complete, or `None` when
/// the whole period has elapsed.
fn prune_len(
    dimension: Dimension,
    date: NaiveDate,
    now_date: NaiveDate,
    now_hour: u32,
) -> Option<usize> {
    match dimension {
        Dimension::Day if date == now_date => Some(now_hour as usize),
        Dimension::Month if date.year() == now_date.year() && date.month() == now_date.month() => {
            Some(now_date.day() as usize)
        }
        Dimension::Year if date.year() == now_date.year() => Some(now_date.month() as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_prune_len_current_day() {
        let len = prune_len(Dimension::Day, date("2024-03-10"), date("2024-03-10"), 14);
        assert_eq!(len, Some(14));
    }

    #[test]
    fn test_prune_len_past_day_untouched() {
        let len = prune_len(Dimension::Day, date("2024-03-09"), date("2024-03-10"), 14);
        assert_eq!(len, None);
    }

    #[test]
    fn test_prune_len_current_month_and_year() {
        assert_eq!(
            prune_len(Dimension::Month, date("2024-03-01"), date("2024-03-10"), 0),
            Some(10)
        );
        assert_eq!(
            prune_len(Dimension::Year, date("2024-01-01"), date("2024-03-10"), 0),
            Some(3)
        );
        assert_eq!(
            prune_len(Dimension::Month, date("2024-02-01"), date("2024-03-10"), 0),
            None
        );
    }

    #[test]
    fn test_message_catalogue_lookup() {
        let json = r#"{"messages": {"en": {"40257": "Parameter error"}, "de": {"40257": "Parameterfehler"}}}"#;
        let catalogue: MessageCatalogue = serde_json::from_str(json).unwrap();
        assert_eq!(catalogue.lookup("en", 40257), Some("Parameter error"));
        assert_eq!(catalogue.lookup("fr", 40257), None);
        assert_eq!(catalogue.lookup("en", 1), None);
    }

    #[test]
    fn test_serials_formatting() {
        let devices = vec![DeviceSummary {
            device_sn: "60BH37202BFA097".to_string(),
            device_type: "H1-3.7".to_string(),
            status: None,
            station_id: None,
        }];
        assert_eq!(serials(&devices), "60BH37202BFA097 (H1-3.7)");
        assert_eq!(serials(&[]), "(no devices)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_queries_to_same_path() {
        let client = CloudClient::new(Config::with_api_key("key")).unwrap();
        let started = Instant::now();
        client.throttle("/op/v0/device/history/query").await;
        client.throttle("/op/v0/device/history/query").await;
        assert!(started.elapsed() >= client.config.query_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_skips_non_query_paths() {
        let client = CloudClient::new(Config::with_api_key("key")).unwrap();
        let started = Instant::now();
        client.throttle("/op/v0/device/detail").await;
        client.throttle("/op/v0/device/detail").await;
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_waits_overlap_across_paths() {
        let client = std::sync::Arc::new(CloudClient::new(Config::with_api_key("key")).unwrap());
        let delay = client.config.query_delay;
        let started = Instant::now();

        let a = tokio::spawn({
            let client = client.clone();
            async move {
                client.throttle("/op/v0/device/history/query").await;
                client.throttle("/op/v0/device/history/query").await;
            }
        });
        let b = tokio::spawn({
            let client = client.clone();
            async move {
                client.throttle("/op/v0/device/report/query").await;
                client.throttle("/op/v0/device/report/query").await;
            }
        });
        assert_ok!(a.await);
        assert_ok!(b.await);

        // Each path waited out its own gap, concurrently.
        assert!(started.elapsed() >= delay);
        assert!(started.elapsed() < delay * 2);
    }

    #[test]
    fn test_history_page_deserialization() {
        let json = r#"[{"datas": [{"variable": "pvPower", "unit": "kW", "data": []}]}]"#;
        let pages: Vec<HistoryPage> = serde_json::from_str(json).unwrap();
        assert_eq!(pages[0].datas.len(), 1);
        assert_eq!(pages[0].datas[0].variable, "pvPower");
    }
}
