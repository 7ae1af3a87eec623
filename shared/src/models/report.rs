//! Production report models.
//!
//! The report endpoint returns pre-aggregated energy values per hour,
//! day, or month. Values occasionally come back corrupted (the cloud
//! mangles the high word of a 32-bit energy total) and are repaired
//! client-side before use.

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while interpreting report parameters.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report variable name was not recognised.
    #[error(
        "Unknown report variable: '{0}'. Expected 'generation', 'feedin', 'loads', \
         'gridConsumption', 'chargeEnergyToTal', or 'dischargeEnergyToTal'"
    )]
    UnknownVariable(String),

    /// The report dimension was not recognised.
    #[error("Unknown report dimension: '{0}'. Expected 'day', 'month', or 'year'")]
    UnknownDimension(String),
}

/// Report aggregation dimension: values per hour of a day, per day of a
/// month, or per month of a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Hourly values for one day.
    Day,
    /// Daily values for one month.
    Month,
    /// Monthly values for one year.
    Year,
}

impl Dimension {
    /// Returns the wire form of the dimension.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(ReportError::UnknownDimension(other.to_string())),
        }
    }
}

/// The energy quantities the report endpoint can aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportVariable {
    /// Inverter output energy.
    Generation,
    /// Energy exported to the grid.
    Feedin,
    /// Energy consumed by the house.
    Loads,
    /// Energy imported from the grid.
    GridConsumption,
    /// Energy charged into the battery.
    ChargeEnergyTotal,
    /// Energy discharged from the battery.
    DischargeEnergyTotal,
}

impl ReportVariable {
    /// All report variables, in the cloud's canonical order.
    pub const ALL: [Self; 6] = [
        Self::Generation,
        Self::Feedin,
        Self::Loads,
        Self::GridConsumption,
        Self::ChargeEnergyTotal,
        Self::DischargeEnergyTotal,
    ];

    /// Returns the wire name used in query bodies. The battery totals
    /// keep the cloud's characteristic "ToTal" casing.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Feedin => "feedin",
            Self::Loads => "loads",
            Self::GridConsumption => "gridConsumption",
            Self::ChargeEnergyTotal => "chargeEnergyToTal",
            Self::DischargeEnergyTotal => "dischargeEnergyToTal",
        }
    }

    /// Returns the human-readable name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Generation => "Generation",
            Self::Feedin => "Grid Export",
            Self::Loads => "Consumption",
            Self::GridConsumption => "Grid Import",
            Self::ChargeEnergyTotal => "Battery Charge",
            Self::DischargeEnergyTotal => "Battery Discharge",
        }
    }
}

impl std::fmt::Display for ReportVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportVariable {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReportError::UnknownVariable(s.to_string()))
    }
}

/// One aggregated value within a report series.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReportValue {
    /// Index within the dimension (hour of day, day of month, month of
    /// year); 1-based as the cloud sends it.
    #[serde(default)]
    pub index: u32,
    /// Energy in kWh.
    pub value: f64,
}

/// A report series for one variable.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSeries {
    /// Wire name of the variable.
    pub variable: String,
    /// Unit of the values, normally "kWh".
    #[serde(default)]
    pub unit: Option<String>,
    /// The aggregated values.
    #[serde(default)]
    pub values: Vec<ReportValue>,
}

/// Values above this are assumed corrupted (the cloud mangles the high
/// word of some 32-bit energy totals).
pub const FIX_VALUE_THRESHOLD: f64 = 200_000_000.0;

const FIX_VALUE_MASK: i64 = 0x0000_FFFF;

/// Repairs a corrupted energy value by masking it back to its low word
/// (at one-decimal precision). Values at or below the threshold pass
/// through unchanged.
#[must_use]
pub fn fix_energy_value(value: f64) -> f64 {
    if value > FIX_VALUE_THRESHOLD {
        #[allow(clippy::cast_possible_truncation)]
        let masked = (value * 10.0) as i64 & FIX_VALUE_MASK;
        #[allow(clippy::cast_precision_loss)]
        return masked as f64 / 10.0;
    }
    value
}

impl ReportSeries {
    /// Repairs corrupted values in place.
    pub fn fix_values(&mut self) {
        for v in &mut self.values {
            v.value = fix_energy_value(v.value);
        }
    }

    /// Truncates the series to its first `len` values. Used to prune a
    /// partially elapsed day, month, or year down to complete entries.
    pub fn prune(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Sum of the values.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().map(|v| v.value).sum()
    }

    /// Largest value, if any.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.values.iter().map(|v| v.value).fold(None, |acc, v| {
            Some(acc.map_or(v, |m: f64| if v > m { v } else { m }))
        })
    }

    /// The variable parsed back to its enum form, when recognised.
    #[must_use]
    pub fn report_variable(&self) -> Option<ReportVariable> {
        self.variable.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(variable: &str, values: &[f64]) -> ReportSeries {
        ReportSeries {
            variable: variable.to_string(),
            unit: Some("kWh".to_string()),
            values: values
                .iter()
                .enumerate()
                .map(|(i, v)| ReportValue {
                    index: u32::try_from(i).unwrap() + 1,
                    value: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_fix_energy_value_masks_high_word() {
        // 429497196.7 * 10 = 4294971967 = 0x1_0000_0EBF; masked low word
        // 0x0EBF = 3775 tenths.
        assert!((fix_energy_value(429_497_196.7) - 377.5).abs() < 0.11);
        // Sane values pass through.
        assert!((fix_energy_value(12.5) - 12.5).abs() < f64::EPSILON);
        assert!(
            (fix_energy_value(FIX_VALUE_THRESHOLD) - FIX_VALUE_THRESHOLD).abs() < f64::EPSILON
        );
    }

    #[test]
    fn test_series_fix_values() {
        let mut s = series("generation", &[1.5, 300_000_000.0]);
        s.fix_values();
        assert!((s.values[0].value - 1.5).abs() < f64::EPSILON);
        assert!(s.values[1].value < FIX_VALUE_THRESHOLD);
    }

    #[test]
    fn test_series_prune_and_total() {
        let mut s = series("loads", &[1.0, 2.0, 3.0, 4.0]);
        s.prune(2);
        assert_eq!(s.values.len(), 2);
        assert!((s.total() - 3.0).abs() < f64::EPSILON);
        assert_eq!(s.max(), Some(2.0));
    }

    #[test]
    fn test_report_variable_wire_names() {
        assert_eq!(ReportVariable::GridConsumption.as_str(), "gridConsumption");
        assert_eq!(
            ReportVariable::ChargeEnergyTotal.as_str(),
            "chargeEnergyToTal"
        );
        assert_eq!(
            "feedin".parse::<ReportVariable>().unwrap(),
            ReportVariable::Feedin
        );
        assert!("solar".parse::<ReportVariable>().is_err());
    }

    #[test]
    fn test_report_variable_display_names() {
        assert_eq!(ReportVariable::Feedin.display_name(), "Grid Export");
        assert_eq!(
            ReportVariable::GridConsumption.display_name(),
            "Grid Import"
        );
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!("day".parse::<Dimension>().unwrap(), Dimension::Day);
        assert_eq!("YEAR".parse::<Dimension>().unwrap(), Dimension::Year);
        assert!("week".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_series_deserialization() {
        let json = r#"{
            "variable": "feedin",
            "unit": "kWh",
            "values": [{"index": 1, "value": 0.4}, {"index": 2, "value": 1.1}]
        }"#;
        let s: ReportSeries = serde_json::from_str(json).unwrap();
        assert_eq!(s.report_variable(), Some(ReportVariable::Feedin));
        assert_eq!(s.values.len(), 2);
    }
}
