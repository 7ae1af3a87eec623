//! Raw history series and client-side energy summaries.
//!
//! The history endpoint returns power samples (typically one every five
//! minutes). Energy is integrated client-side from those samples, with
//! optional peak/off-peak bucketing against a time-of-use tariff.

use crate::tariff::{time_hours, Tariff};
use serde::Deserialize;

/// One timestamped sample. The cloud formats times as
/// `YYYY-MM-DD HH:MM:SS <zone>`; the clock portion is at bytes 11..19.
#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    /// Timestamp string as received.
    pub time: String,
    /// Sample value in the series unit.
    pub value: f64,
}

impl Sample {
    /// Returns the `HH:MM` clock portion of the timestamp, if present.
    #[must_use]
    pub fn clock(&self) -> Option<&str> {
        self.time.get(11..16)
    }

    /// Returns the sample time as decimal hours, if the timestamp
    /// carries a parseable `HH:MM:SS` clock.
    #[must_use]
    pub fn hour(&self) -> Option<f64> {
        self.time.get(11..19).and_then(|t| time_hours(t).ok())
    }
}

/// A raw data series for one variable over one day.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySeries {
    /// Variable identifier, e.g. "pvPower".
    pub variable: String,
    /// Unit of the samples; power series report "kW".
    #[serde(default)]
    pub unit: Option<String>,
    /// Display name from the cloud.
    #[serde(default)]
    pub name: Option<String>,
    /// The samples, in time order.
    #[serde(default)]
    pub data: Vec<Sample>,
}

impl HistorySeries {
    /// True when this series holds power samples that can be integrated
    /// to energy.
    #[must_use]
    pub fn is_energy(&self) -> bool {
        self.unit.as_deref() == Some("kW")
    }

    /// Minutes between consecutive samples, inferred from the first two
    /// samples and defaulting to 5.
    #[must_use]
    pub fn sample_minutes(&self) -> f64 {
        match (
            self.data.first().and_then(Sample::hour),
            self.data.get(1).and_then(Sample::hour),
        ) {
            (Some(a), Some(b)) if b > a => ((b - a) * 60.0 * 100.0).round() / 100.0,
            _ => 5.0,
        }
    }

    /// Computes summary statistics for the series, integrating kW
    /// samples to kWh and bucketing energy against the tariff if one is
    /// given.
    #[must_use]
    pub fn summarize(&self, tariff: Option<&Tariff>) -> HistorySummary {
        let mut summary = HistorySummary::default();
        let energy = self.is_energy();
        let sample_minutes = self.sample_minutes();
        let mut sum = 0.0;

        for sample in &self.data {
            let value = sample.value;
            sum += value;
            summary.count += 1;
            if summary.max.is_none_or(|m| value > m) {
                summary.max = Some(value);
                summary.max_time = sample.clock().map(str::to_string);
            }
            if summary.min.is_none_or(|m| value < m) {
                summary.min = Some(value);
                summary.min_time = sample.clock().map(str::to_string);
            }
            if energy {
                let e = value * sample_minutes / 60.0;
                if e > 0.0 {
                    summary.kwh += e;
                    if let (Some(tariff), Some(h)) = (tariff, sample.hour()) {
                        if tariff.is_off_peak(h) {
                            summary.kwh_off += e;
                        } else if tariff.is_peak(h) {
                            summary.kwh_peak += e;
                        }
                    }
                } else {
                    summary.kwh_neg -= e;
                }
            }
        }
        if summary.count > 0 {
            summary.average = Some(sum / f64::from(summary.count));
        }
        summary
    }
}

/// Summary statistics computed from one [`HistorySeries`].
#[derive(Debug, Clone, Default)]
pub struct HistorySummary {
    /// Number of samples.
    pub count: u32,
    /// Mean sample value.
    pub average: Option<f64>,
    /// Largest sample value.
    pub max: Option<f64>,
    /// `HH:MM` time of the largest sample.
    pub max_time: Option<String>,
    /// Smallest sample value.
    pub min: Option<f64>,
    /// `HH:MM` time of the smallest sample.
    pub min_time: Option<String>,
    /// Positive energy integrated from the samples, kWh.
    pub kwh: f64,
    /// Energy that fell in off-peak tariff periods, kWh.
    pub kwh_off: f64,
    /// Energy that fell in peak tariff periods, kWh.
    pub kwh_peak: f64,
    /// Magnitude of negative energy (e.g. CT2 generation), kWh.
    pub kwh_neg: f64,
}
