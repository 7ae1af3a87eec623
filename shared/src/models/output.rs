//! Daily output records in PVOutput's bulk "Add Output" CSV format.
//!
//! The format is positional: 18 comma-separated fields per day, with
//! empty fields for values not supplied. See
//! <https://pvoutput.org/help/api_specification.html#add-output-service>.

use chrono::NaiveDate;

/// Time-of-use energy splits in Wh. The "shoulder" bucket is whatever
/// fell outside both peak and off-peak periods; the high-shoulder
/// bucket is never populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouSplits {
    /// Exported energy during peak periods.
    pub export_peak_wh: i64,
    /// Exported energy during off-peak periods.
    pub export_off_peak_wh: i64,
    /// Exported energy outside peak and off-peak periods.
    pub export_shoulder_wh: i64,
    /// Imported energy during peak periods.
    pub import_peak_wh: i64,
    /// Imported energy during off-peak periods.
    pub import_off_peak_wh: i64,
    /// Imported energy outside peak and off-peak periods.
    pub import_shoulder_wh: i64,
}

/// One day of energy data ready for PVOutput.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// The day the record covers.
    pub date: NaiveDate,
    /// Generated energy in Wh.
    pub generated_wh: i64,
    /// Exported energy in Wh. Omitted under time-of-use, where the
    /// export splits carry the data instead.
    pub exported_wh: Option<i64>,
    /// Peak generation power in W.
    pub peak_power_w: Option<i64>,
    /// `HH:MM` time of peak generation.
    pub peak_time: Option<String>,
    /// Consumed energy in Wh.
    pub consumed_wh: Option<i64>,
    /// Imported energy in Wh (without time-of-use splits).
    pub imported_wh: Option<i64>,
    /// Time-of-use splits, when a tariff is in force.
    pub tou: Option<TouSplits>,
}

impl OutputRecord {
    /// Renders the record as one CSV line in the Add Output field order:
    /// date, generated, exported, peak power, peak time, condition,
    /// min/max temperature, comments, four import buckets, consumption,
    /// four export buckets.
    #[must_use]
    pub fn to_csv_line(&self) -> String {
        let date = self.date.format("%Y%m%d").to_string();
        let opt = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();

        let exported = if self.tou.is_some() {
            String::new()
        } else {
            opt(self.exported_wh)
        };
        let peak_power = opt(self.peak_power_w);
        let peak_time = self.peak_time.clone().unwrap_or_default();
        let consumed = opt(self.consumed_wh);

        let (imports, exports) = match (&self.tou, self.imported_wh) {
            (Some(tou), _) => (
                format!(
                    "{},{},{},0",
                    tou.import_peak_wh, tou.import_off_peak_wh, tou.import_shoulder_wh
                ),
                format!(
                    "{},{},{},0",
                    tou.export_peak_wh, tou.export_off_peak_wh, tou.export_shoulder_wh
                ),
            ),
            (None, Some(wh)) => (format!("0,0,{wh},0"), ",,,".to_string()),
            (None, None) => (",,,".to_string(), ",,,".to_string()),
        };

        format!(
            "{date},{generated},{exported},{peak_power},{peak_time},,,,,{imports},{consumed},{exports}",
            generated = self.generated_wh,
        )
    }
}

impl std::fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_csv_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn record() -> OutputRecord {
        OutputRecord {
            date: date("2024-03-10"),
            generated_wh: 12340,
            exported_wh: Some(5210),
            peak_power_w: Some(3650),
            peak_time: Some("12:35".to_string()),
            consumed_wh: Some(9800),
            imported_wh: Some(2770),
            tou: None,
        }
    }

    #[test]
    fn test_csv_line_without_tou() {
        let line = record().to_csv_line();
        assert_eq!(line, "20240310,12340,5210,3650,12:35,,,,,0,0,2770,0,9800,,,,");
        assert_eq!(line.matches(',').count(), 17);
    }

    #[test]
    fn test_csv_line_with_tou() {
        let mut r = record();
        r.tou = Some(TouSplits {
            export_peak_wh: 3000,
            export_off_peak_wh: 200,
            export_shoulder_wh: 2010,
            import_peak_wh: 150,
            import_off_peak_wh: 2400,
            import_shoulder_wh: 220,
        });
        let line = r.to_csv_line();
        assert_eq!(
            line,
            "20240310,12340,,3650,12:35,,,,,150,2400,220,0,9800,3000,200,2010,0"
        );
        assert_eq!(line.matches(',').count(), 17);
    }

    #[test]
    fn test_csv_line_minimal() {
        let r = OutputRecord {
            date: date("2024-03-10"),
            generated_wh: 500,
            exported_wh: None,
            peak_power_w: None,
            peak_time: None,
            consumed_wh: None,
            imported_wh: None,
            tou: None,
        };
        assert_eq!(r.to_csv_line(), "20240310,500,,,,,,,,,,,,,,,,");
    }

    #[test]
    fn test_display_matches_csv() {
        let r = record();
        assert_eq!(r.to_string(), r.to_csv_line());
    }
}
