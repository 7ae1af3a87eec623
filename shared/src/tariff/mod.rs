//! Time-of-use tariff periods.
//!
//! Energy suppliers price electricity by time of day; PVOutput accepts
//! imported/exported energy split into peak and off-peak buckets. Times
//! are held as decimal hours (01:30 = 1.5) so period arithmetic stays
//! simple, and periods may wrap midnight (e.g. 23:30 - 05:30).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with tariffs.
#[derive(Debug, Error)]
pub enum TariffError {
    /// The tariff name did not match a built-in preset.
    #[error("Unknown tariff: '{0}'")]
    UnknownTariff(String),

    /// A time string could not be parsed as HH:MM or HH:MM:SS.
    #[error("Invalid time string: '{0}'")]
    InvalidTime(String),
}

/// A daily time period in decimal hours. A period whose start and end
/// are equal is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    /// Start of the period in decimal hours.
    pub start: f64,
    /// End of the period in decimal hours (exclusive).
    pub end: f64,
}

impl TimePeriod {
    /// Creates a period from decimal hours.
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// An empty period.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
        }
    }

    /// Returns true if the given decimal hour falls inside this period.
    /// Hours outside 0..24 are wrapped first. A period with `start > end`
    /// wraps midnight.
    #[must_use]
    pub fn contains(&self, hour: f64) -> bool {
        if self.start == self.end {
            return false;
        }
        let mut h = hour;
        while h < 0.0 {
            h += 24.0;
        }
        while h >= 24.0 {
            h -= 24.0;
        }
        if self.start > self.end {
            h >= self.start || h < self.end
        } else {
            h >= self.start && h < self.end
        }
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", hours_time(self.start), hours_time(self.end))
    }
}

/// Named time-of-use tariff with two off-peak and two peak periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    /// Display name of the tariff.
    pub name: String,
    /// First off-peak period (typically the overnight charging window).
    pub off_peak1: TimePeriod,
    /// Second off-peak period.
    pub off_peak2: TimePeriod,
    /// First peak period.
    pub peak: TimePeriod,
    /// Second peak period.
    pub peak2: TimePeriod,
}

impl Tariff {
    /// Returns true if the decimal hour falls in either off-peak period.
    #[must_use]
    pub fn is_off_peak(&self, hour: f64) -> bool {
        self.off_peak1.contains(hour) || self.off_peak2.contains(hour)
    }

    /// Returns true if the decimal hour falls in either peak period.
    #[must_use]
    pub fn is_peak(&self, hour: f64) -> bool {
        self.peak.contains(hour) || self.peak2.contains(hour)
    }

    /// Looks up a built-in tariff preset by name (case-insensitive,
    /// matching on a leading substring of the display name).
    ///
    /// # Errors
    ///
    /// Returns [`TariffError::UnknownTariff`] if no preset matches.
    pub fn preset(name: &str) -> Result<Self, TariffError> {
        let wanted = name.to_lowercase();
        presets()
            .into_iter()
            .find(|t| t.name.to_lowercase().starts_with(&wanted))
            .ok_or_else(|| TariffError::UnknownTariff(name.to_string()))
    }

    fn named(
        name: &str,
        off_peak1: TimePeriod,
        off_peak2: TimePeriod,
        peak: TimePeriod,
        peak2: TimePeriod,
    ) -> Self {
        Self {
            name: name.to_string(),
            off_peak1,
            off_peak2,
            peak,
            peak2,
        }
    }
}

impl Default for Tariff {
    /// Octopus Flux, the tariff assumed when none is configured.
    fn default() -> Self {
        Self::named(
            "Octopus Flux",
            TimePeriod::new(2.0, 5.0),
            TimePeriod::empty(),
            TimePeriod::new(16.0, 19.0),
            TimePeriod::empty(),
        )
    }
}

/// All built-in tariff presets.
#[must_use]
pub fn presets() -> Vec<Tariff> {
    vec![
        Tariff::default(),
        Tariff::named(
            "Intelligent Octopus",
            TimePeriod::new(23.5, 5.5),
            TimePeriod::empty(),
            TimePeriod::empty(),
            TimePeriod::empty(),
        ),
        Tariff::named(
            "Octopus Cosy",
            TimePeriod::new(4.0, 7.0),
            TimePeriod::new(13.0, 16.0),
            TimePeriod::new(16.0, 19.0),
            TimePeriod::empty(),
        ),
        Tariff::named(
            "Octopus Go",
            TimePeriod::new(0.5, 4.5),
            TimePeriod::empty(),
            TimePeriod::empty(),
            TimePeriod::empty(),
        ),
        Tariff::named(
            "Agile Octopus",
            TimePeriod::new(2.5, 5.0),
            TimePeriod::empty(),
            TimePeriod::new(16.0, 19.0),
            TimePeriod::empty(),
        ),
        Tariff::named(
            "British Gas Electric Driver",
            TimePeriod::new(0.0, 5.0),
            TimePeriod::empty(),
            TimePeriod::empty(),
            TimePeriod::empty(),
        ),
    ]
}

/// Converts a `HH:MM` or `HH:MM:SS` time string to decimal hours.
///
/// # Errors
///
/// Returns [`TariffError::InvalidTime`] if the string is not a valid
/// clock time.
pub fn time_hours(t: &str) -> Result<f64, TariffError> {
    let parts: Vec<&str> = t.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(TariffError::InvalidTime(t.to_string()));
    }
    let mut total = 0.0;
    for (part, divisor) in parts.iter().zip([1.0, 60.0, 3600.0]) {
        let value: f64 = part
            .parse()
            .map_err(|_| TariffError::InvalidTime(t.to_string()))?;
        total += value / divisor;
    }
    Ok(total)
}

/// Converts decimal hours to a `HH:MM` time string, wrapping into 0..24.
#[must_use]
pub fn hours_time(hours: f64) -> String {
    let mut h = hours;
    while h < 0.0 {
        h += 24.0;
    }
    while h >= 24.0 {
        h -= 24.0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (hh, mm) = (h as u32, (h * 60.0 % 60.0) as u32);
    format!("{hh:02}:{mm:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_contains() {
        let period = TimePeriod::new(2.0, 5.0);
        assert!(period.contains(2.0));
        assert!(period.contains(4.99));
        assert!(!period.contains(5.0));
        assert!(!period.contains(1.99));
    }

    #[test]
    fn test_period_wraps_midnight() {
        let period = TimePeriod::new(23.5, 5.5);
        assert!(period.contains(23.75));
        assert!(period.contains(0.0));
        assert!(period.contains(5.25));
        assert!(!period.contains(5.5));
        assert!(!period.contains(12.0));
    }

    #[test]
    fn test_empty_period_contains_nothing() {
        assert!(!TimePeriod::empty().contains(0.0));
        assert!(!TimePeriod::empty().contains(12.0));
    }

    #[test]
    fn test_period_wraps_out_of_range_hours() {
        let period = TimePeriod::new(2.0, 5.0);
        assert!(period.contains(26.0));
        assert!(period.contains(-22.0));
    }

    #[test]
    fn test_default_tariff_is_octopus_flux() {
        let tariff = Tariff::default();
        assert_eq!(tariff.name, "Octopus Flux");
        assert_eq!(tariff, Tariff::preset("Octopus Flux").unwrap());
    }

    #[test]
    fn test_preset_lookup() {
        let tariff = Tariff::preset("octopus flux").unwrap();
        assert_eq!(tariff.name, "Octopus Flux");
        assert!(tariff.is_off_peak(3.0));
        assert!(tariff.is_peak(17.0));
        assert!(!tariff.is_peak(12.0));

        assert!(Tariff::preset("economy 7").is_err());
    }

    #[test]
    fn test_cosy_uses_both_off_peak_periods() {
        let tariff = Tariff::preset("Octopus Cosy").unwrap();
        assert!(tariff.is_off_peak(5.0));
        assert!(tariff.is_off_peak(14.0));
        assert!(!tariff.is_off_peak(10.0));
    }

    #[test]
    fn test_time_hours() {
        assert!((time_hours("01:30").unwrap() - 1.5).abs() < 1e-9);
        assert!((time_hours("16:00:00").unwrap() - 16.0).abs() < 1e-9);
        assert!((time_hours("00:00").unwrap()).abs() < 1e-9);
        assert!(time_hours("not a time").is_err());
    }

    #[test]
    fn test_hours_time() {
        assert_eq!(hours_time(1.5), "01:30");
        assert_eq!(hours_time(16.0), "16:00");
        assert_eq!(hours_time(25.5), "01:30");
        assert_eq!(hours_time(-0.5), "23:30");
    }

    #[test]
    fn test_period_display() {
        assert_eq!(TimePeriod::new(2.0, 5.0).to_string(), "02:00 - 05:00");
    }
}
