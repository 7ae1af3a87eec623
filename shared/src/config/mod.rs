//! Account configuration module.
//!
//! Handles loading cloud credentials, device selection, and calibration
//! tuning from environment variables with sensible defaults.

use crate::tariff::Tariff;
use anyhow::Result;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default cloud API endpoint.
pub const DEFAULT_API_DOMAIN: &str = "https://www.foxesscloud.com";

/// Browser-style user agent sent with every request. The cloud rejects
/// requests with an unrecognised agent string.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Cloud API configuration.
///
/// Configuration values can be set via environment variables:
/// - `SOLSIGHT_API_KEY`: Open API key generated on the cloud account page
/// - `SOLSIGHT_DEVICE_SN`: serial number of the inverter to query
/// - `SOLSIGHT_API_DOMAIN`: API endpoint (default: `https://www.foxesscloud.com`)
/// - `SOLSIGHT_TIME_ZONE`: IANA time zone sent with requests (default: "Europe/London")
/// - `SOLSIGHT_LANG`: language code for error messages (default: "en")
/// - `SOLSIGHT_QUERY_DELAY_MS`: minimum gap between queries to the same path (default: 1000)
/// - `SOLSIGHT_TARIFF`: tariff preset for time-of-use bucketing (default: "Octopus Flux")
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// Open API key for the cloud account.
    #[validate(length(min = 1, message = "API key cannot be empty"))]
    pub api_key: String,
    /// Serial number (or unique prefix) of the inverter to query.
    #[validate(custom(function = validate_serial))]
    pub device_sn: Option<String>,
    /// API endpoint, without a trailing slash.
    #[validate(length(min = 1, message = "API domain cannot be empty"))]
    pub api_domain: String,
    /// IANA time zone sent in request headers.
    pub time_zone: String,
    /// Language code used to resolve cloud error messages.
    pub lang: String,
    /// Minimum gap enforced between queries to the same API path.
    pub query_delay: Duration,
    /// Tariff used for time-of-use bucketing when it is enabled.
    pub tariff: Tariff,
    /// Calibration applied when assembling PVOutput records.
    pub calibration: Calibration,
    /// PVOutput upload credentials, if configured.
    pub pvoutput: Option<PvOutputConfig>,
}

/// PVOutput service credentials.
///
/// Set via `SOLSIGHT_PV_API_KEY` and `SOLSIGHT_PV_SYSTEM_ID`.
#[derive(Debug, Clone, Validate)]
pub struct PvOutputConfig {
    /// PVOutput API key.
    #[validate(length(min = 1, message = "PVOutput API key cannot be empty"))]
    pub api_key: String,
    /// PVOutput system identifier.
    #[validate(length(min = 1, message = "PVOutput system id cannot be empty"))]
    pub system_id: String,
}

/// Calibration factors applied to cloud data before upload.
///
/// The cloud's PV energy runs slightly high and the CT2 clamp slightly
/// low compared with metered values; both are scaled before upload.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    /// Divisor applied to PV energy (default 0.98).
    pub pv: f64,
    /// Divisor applied to CT2 (secondary generation meter) energy (default 0.92).
    pub ct2: f64,
    /// Upper bound on plausible PV power in kW (default 100.0). The cloud
    /// occasionally returns PV voltage in place of power; a day whose peak
    /// exceeds this limit is rejected rather than uploaded.
    pub max_pv_power: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pv: 0.98,
            ct2: 0.92,
            max_pv_power: 100.0,
        }
    }
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `SOLSIGHT_API_KEY` is unset or empty
    /// - a numeric variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SOLSIGHT_API_KEY")
            .map_err(|_| anyhow::anyhow!("SOLSIGHT_API_KEY is not set"))?;

        let device_sn = std::env::var("SOLSIGHT_DEVICE_SN").ok();

        let api_domain = std::env::var("SOLSIGHT_API_DOMAIN")
            .unwrap_or_else(|_| DEFAULT_API_DOMAIN.to_string());

        let time_zone =
            std::env::var("SOLSIGHT_TIME_ZONE").unwrap_or_else(|_| "Europe/London".to_string());

        let lang = std::env::var("SOLSIGHT_LANG").unwrap_or_else(|_| "en".to_string());

        let query_delay_ms = std::env::var("SOLSIGHT_QUERY_DELAY_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()?
            .unwrap_or(1000);

        let tariff = match std::env::var("SOLSIGHT_TARIFF") {
            Ok(name) => Tariff::preset(&name)?,
            Err(_) => Tariff::default(),
        };

        let calibration = Calibration {
            pv: parse_env_f64("SOLSIGHT_PV_CALIBRATION")?.unwrap_or(0.98),
            ct2: parse_env_f64("SOLSIGHT_CT2_CALIBRATION")?.unwrap_or(0.92),
            max_pv_power: parse_env_f64("SOLSIGHT_MAX_PV_POWER")?.unwrap_or(100.0),
        };

        let pvoutput = match (
            std::env::var("SOLSIGHT_PV_API_KEY").ok(),
            std::env::var("SOLSIGHT_PV_SYSTEM_ID").ok(),
        ) {
            (Some(api_key), Some(system_id)) => Some(PvOutputConfig { api_key, system_id }),
            _ => None,
        };

        let config = Self {
            api_key,
            device_sn,
            api_domain,
            time_zone,
            lang,
            query_delay: Duration::from_millis(query_delay_ms),
            tariff,
            calibration,
            pvoutput,
        };
        config.validate()?;

        Ok(config)
    }

    /// Creates a configuration with the given API key and defaults elsewhere.
    ///
    /// Useful for testing or when credentials come from somewhere other
    /// than the environment.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            device_sn: None,
            api_domain: DEFAULT_API_DOMAIN.to_string(),
            time_zone: "Europe/London".to_string(),
            lang: "en".to_string(),
            query_delay: Duration::from_millis(1000),
            tariff: Tariff::default(),
            calibration: Calibration::default(),
            pvoutput: None,
        }
    }
}

/// Inverter serials are up to 15 alphanumeric characters; a shorter
/// value is accepted as a prefix for device selection.
fn validate_serial(sn: &str) -> Result<(), ValidationError> {
    let ok = (1..=15).contains(&sn.len()) && sn.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("device_sn");
        err.message = Some("serial is 1-15 alphanumeric characters".into());
        Err(err)
    }
}

fn parse_env_f64(name: &str) -> Result<Option<f64>> {
    std::env::var(name)
        .ok()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|e| anyhow::anyhow!("{name} is not a valid number: {e}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key_defaults() {
        let config = Config::with_api_key("abc123");
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.api_domain, DEFAULT_API_DOMAIN);
        assert_eq!(config.time_zone, "Europe/London");
        assert_eq!(config.lang, "en");
        assert_eq!(config.query_delay, Duration::from_millis(1000));
        assert!(config.pvoutput.is_none());
    }

    #[test]
    fn test_calibration_defaults() {
        let cal = Calibration::default();
        assert!((cal.pv - 0.98).abs() < f64::EPSILON);
        assert!((cal.ct2 - 0.92).abs() < f64::EPSILON);
        assert!((cal.max_pv_power - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_empty_api_key() {
        let config = Config::with_api_key("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_serial_shape() {
        let mut config = Config::with_api_key("abc123");

        config.device_sn = Some("60BH37202BFA097".to_string());
        assert!(config.validate().is_ok());
        config.device_sn = Some("60BH".to_string());
        assert!(config.validate().is_ok());

        config.device_sn = Some("60BH37202BFA0971".to_string());
        assert!(config.validate().is_err());
        config.device_sn = Some("60BH-37202".to_string());
        assert!(config.validate().is_err());
        config.device_sn = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_tariff() {
        let config = Config::with_api_key("abc123");
        assert_eq!(config.tariff.name, "Octopus Flux");
    }

    #[test]
    fn test_pvoutput_config_validation() {
        let pv = PvOutputConfig {
            api_key: "key".to_string(),
            system_id: "12345".to_string(),
        };
        assert!(pv.validate().is_ok());

        let pv = PvOutputConfig {
            api_key: String::new(),
            system_id: "12345".to_string(),
        };
        assert!(pv.validate().is_err());
    }
}
