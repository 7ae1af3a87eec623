//! Daily output assembly and PVOutput upload.
//!
//! For each day this module combines two cloud queries into one
//! [`OutputRecord`]: the month-dimension report supplies authoritative
//! energy totals, and the raw power history supplies the generation
//! curve (for peak power, CT2 secondary generation, and time-of-use
//! bucketing). Records can be printed as CSV for PVOutput's bulk
//! loader or posted straight to the Add Output service.

use crate::client::{ApiError, CloudClient};
use crate::config::{Calibration, PvOutputConfig};
use crate::models::{HistorySeries, OutputRecord, ReportVariable, TouSplits};
use crate::tariff::Tariff;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

/// Add Output service endpoint.
pub const UPLOAD_URL: &str = "https://pvoutput.org/service/r2/addoutput.jsp";

/// PVOutput rejects bursts; uploads are capped to this many days per
/// run.
pub const MAX_UPLOAD_DAYS: usize = 10;

/// Errors that can occur while assembling or uploading output records.
#[derive(Debug, Error)]
pub enum PvOutputError {
    /// A cloud query failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The HTTP upload itself failed.
    #[error("Upload transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The day has no usable generation history.
    #[error("{date}: no generation data available")]
    NoGenerationData {
        /// The day in question.
        date: NaiveDate,
    },

    /// Peak power exceeded the plausibility limit. The cloud sometimes
    /// returns PV voltage in place of power; such days are rejected.
    #[error("{date}: PV power ({peak_kw} kW) exceeds the limit ({limit_kw} kW)")]
    PowerOutOfRange {
        /// The day in question.
        date: NaiveDate,
        /// The implausible peak.
        peak_kw: f64,
        /// The configured limit.
        limit_kw: f64,
    },

    /// PVOutput rejected the credentials.
    #[error("PVOutput denied access; check the API key and system id")]
    Unauthorized,

    /// PVOutput answered with an unexpected status.
    #[error("PVOutput upload returned HTTP {0}")]
    UploadStatus(reqwest::StatusCode),
}

/// Assembles one day's [`OutputRecord`] from cloud data.
///
/// With a tariff, import and export energy are split into time-of-use
/// buckets from the raw power curves; without one, whole-day report
/// totals are used.
///
/// # Errors
///
/// Returns an error when the cloud queries fail, the day has no
/// generation history, or the peak power fails the plausibility check.
pub async fn daily_output(
    client: &CloudClient,
    sn: &str,
    date: NaiveDate,
    tariff: Option<&Tariff>,
) -> Result<OutputRecord, PvOutputError> {
    let report_vars: &[ReportVariable] = if tariff.is_some() {
        &[ReportVariable::Loads]
    } else {
        &[
            ReportVariable::Loads,
            ReportVariable::Feedin,
            ReportVariable::GridConsumption,
        ]
    };
    let totals = client.report_day_totals(sn, date, report_vars).await?;

    let history_vars: &[&str] = if tariff.is_some() {
        &["pvPower", "meterPower2", "feedinPower", "gridConsumptionPower"]
    } else {
        &["pvPower", "meterPower2"]
    };
    let history = client.history(sn, date, history_vars).await?;

    build_record(
        date,
        client.config().calibration,
        tariff,
        &totals,
        history,
    )
}

fn wh(kwh: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let wh = (kwh * 1000.0) as i64;
    wh
}

/// Pure assembly step, separated from the cloud queries for testing.
fn build_record(
    date: NaiveDate,
    calibration: Calibration,
    tariff: Option<&Tariff>,
    report_totals: &[(ReportVariable, f64)],
    mut history: Vec<HistorySeries>,
) -> Result<OutputRecord, PvOutputError> {
    let ct2 = history
        .iter()
        .position(|s| s.variable == "meterPower2")
        .map(|i| history.remove(i));
    let pv = history
        .iter_mut()
        .find(|s| s.variable == "pvPower")
        .ok_or(PvOutputError::NoGenerationData { date })?;
    if pv.data.is_empty() {
        return Err(PvOutputError::NoGenerationData { date });
    }

    // PV energy comes from the unmerged curve; CT2 energy is added on
    // separately below.
    let pv_kwh_raw = pv.summarize(None).kwh;

    // CT2 reads negative while generating; fold it into the PV curve so
    // the peak covers both.
    if let Some(ct2) = &ct2 {
        for (pv_sample, ct2_sample) in pv.data.iter_mut().zip(&ct2.data) {
            if ct2_sample.value <= 0.0 {
                pv_sample.value -= ct2_sample.value / calibration.ct2;
            }
        }
    }

    let merged = pv.summarize(None);
    let ct2_neg = ct2.as_ref().map_or(0.0, |s| s.summarize(None).kwh_neg);
    let pv_kwh = pv_kwh_raw / calibration.pv + ct2_neg / calibration.ct2;

    let peak_kw = merged
        .max
        .ok_or(PvOutputError::NoGenerationData { date })?;
    if peak_kw > calibration.max_pv_power {
        return Err(PvOutputError::PowerOutOfRange {
            date,
            peak_kw,
            limit_kw: calibration.max_pv_power,
        });
    }

    let generated_wh = wh(pv_kwh);
    let mut record = OutputRecord {
        date,
        generated_wh,
        exported_wh: None,
        peak_power_w: Some(wh(peak_kw)),
        peak_time: merged.max_time,
        consumed_wh: None,
        imported_wh: None,
        tou: None,
    };

    if tariff.is_some() {
        let mut splits = TouSplits::default();
        for series in &history {
            let summary = series.summarize(tariff);
            let total = wh(summary.kwh);
            let peak = wh(summary.kwh_peak);
            let off = wh(summary.kwh_off);
            match series.variable.as_str() {
                "feedinPower" => {
                    splits.export_peak_wh = peak;
                    splits.export_off_peak_wh = off;
                    splits.export_shoulder_wh = total - peak - off;
                }
                "gridConsumptionPower" => {
                    splits.import_peak_wh = peak;
                    splits.import_off_peak_wh = off;
                    splits.import_shoulder_wh = total - peak - off;
                }
                _ => {}
            }
        }
        record.tou = Some(splits);
    }

    for (variable, total_kwh) in report_totals {
        let total = wh(*total_kwh);
        match variable {
            ReportVariable::Feedin => {
                // Exported energy cannot exceed generation; the report
                // occasionally disagrees with itself.
                let capped = if total > generated_wh {
                    warn!(%date, exported = total, generated = generated_wh,
                        "exported exceeds generation; capping");
                    generated_wh
                } else {
                    total
                };
                record.exported_wh = Some(capped);
            }
            ReportVariable::Loads => record.consumed_wh = Some(total),
            ReportVariable::GridConsumption => record.imported_wh = Some(total),
            _ => {}
        }
    }

    Ok(record)
}

/// Client for PVOutput's Add Output service.
pub struct PvOutputClient {
    http: reqwest::Client,
    config: PvOutputConfig,
    url: String,
}

impl PvOutputClient {
    /// Creates an upload client with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: PvOutputConfig) -> Result<Self, PvOutputError> {
        Ok(Self {
            http: reqwest::Client::builder().build().map_err(ApiError::from)?,
            config,
            url: UPLOAD_URL.to_string(),
        })
    }

    /// Overrides the upload endpoint. Used by tests.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Uploads one day's record.
    ///
    /// # Errors
    ///
    /// Returns [`PvOutputError::Unauthorized`] on a 401, or
    /// [`PvOutputError::UploadStatus`] on any other non-success status.
    pub async fn upload(&self, record: &OutputRecord) -> Result<(), PvOutputError> {
        let csv = record.to_csv_line();
        let response = self
            .http
            .post(&self.url)
            .header("X-Pvoutput-Apikey", &self.config.api_key)
            .header("X-Pvoutput-SystemId", &self.config.system_id)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("data={csv}"))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PvOutputError::Unauthorized);
        }
        if !status.is_success() {
            return Err(PvOutputError::UploadStatus(status));
        }
        info!(date = %record.date, "uploaded to PVOutput");
        Ok(())
    }
}
