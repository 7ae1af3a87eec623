//! Inverter device models and model-code parsing.

use serde::Deserialize;

/// A device as listed by the device list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSummary {
    /// Inverter serial number.
    #[serde(rename = "deviceSN")]
    pub device_sn: String,
    /// Model code, e.g. "H1-5.0-E".
    #[serde(rename = "deviceType")]
    pub device_type: String,
    /// Whether the cloud currently sees the device online.
    #[serde(default)]
    pub status: Option<i32>,
    /// Station the device belongs to.
    #[serde(rename = "stationID", default)]
    pub station_id: Option<String>,
}

/// Device detail as returned by the detail endpoint, plus attributes
/// derived from the model code.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDetail {
    /// Inverter serial number.
    #[serde(rename = "deviceSN")]
    pub device_sn: String,
    /// Model code, e.g. "H1-5.0-E".
    #[serde(rename = "deviceType")]
    pub device_type: String,
    /// Station the device belongs to.
    #[serde(rename = "stationID", default)]
    pub station_id: Option<String>,
    /// Whether a battery is attached.
    #[serde(rename = "hasBattery", default)]
    pub has_battery: bool,
    /// Whether a PV string is attached.
    #[serde(rename = "hasPV", default)]
    pub has_pv: bool,
    /// Master firmware version.
    #[serde(rename = "masterVersion", default)]
    pub master_version: Option<String>,
}

impl DeviceDetail {
    /// Parses the model code into derived attributes, when recognised.
    #[must_use]
    pub fn model_info(&self) -> Option<ModelInfo> {
        ModelInfo::parse(&self.device_type)
    }
}

/// Lifetime generation totals for a device.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GenerationTotals {
    /// Energy generated today, kWh.
    pub today: f64,
    /// Energy generated this month, kWh.
    pub month: f64,
    /// Energy generated since commissioning, kWh.
    pub cumulative: f64,
}

/// Attributes derived from an inverter model code such as "H1-5.0-E":
/// the model family, phase count, rated power, and whether the unit has
/// an emergency power supply output.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model family, e.g. "H1", "KH", "AIOH3".
    pub model: String,
    /// 1 or 3 phase.
    pub phase: u8,
    /// Rated power in kW, when present in the code.
    pub power: Option<f64>,
    /// True when the model has an EPS output ('E' suffix).
    pub eps: bool,
    /// Maximum battery charge current in amps for the model family.
    pub max_charge_current: u32,
}

/// Model families with known attributes.
const KNOWN_MODELS: [&str; 7] = ["KH", "H1", "AC1", "H3", "AC3", "AIOH1", "AIOH3"];

impl ModelInfo {
    /// Parses a model code. Returns `None` when the family is not
    /// recognised.
    #[must_use]
    pub fn parse(device_type: &str) -> Option<Self> {
        let code = device_type.to_uppercase();
        // "AIO-H1-5.0" and "AIOH1-5.0" are the same family.
        let code = if let Some(rest) = code.strip_prefix("AIO-") {
            format!("AIO{rest}")
        } else {
            code
        };
        let eps = code.contains('E');
        let mut parts = code.split('-');
        let model = parts.next()?.to_string();
        if !KNOWN_MODELS.contains(&model.as_str()) {
            return None;
        }
        let phase = if model.ends_with('3') { 3 } else { 1 };
        // The rating is the first numeric code part, and only counts
        // when it is a plausible number of kW.
        let power = parts
            .find_map(|p| p.parse::<f64>().ok())
            .filter(|p| (1.0..20.0).contains(p));
        let max_charge_current = match model.as_str() {
            "KH" => 50,
            "H1" | "AC1" => 35,
            "H3" | "AC3" | "AIOH3" => 26,
            _ => 40,
        };
        Some(Self {
            model,
            phase,
            power,
            eps,
            max_charge_current,
        })
    }
}
