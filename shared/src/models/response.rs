//! Response envelope shared by all cloud Open API endpoints.

use serde::Deserialize;

/// The JSON envelope every endpoint returns: an error number (0 on
/// success), an optional message, and the payload under `result`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    /// Cloud error number; 0 means success.
    #[serde(default)]
    pub errno: i64,
    /// Optional human-readable message accompanying a failure.
    #[serde(default)]
    pub msg: Option<String>,
    /// Payload, present on success.
    #[serde(default)]
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Returns true if the envelope reports success and carries a payload.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errno == 0 && self.result.is_some()
    }
}

/// A paged list payload, as returned by the device and plant list
/// endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paged<T> {
    /// Total number of entries on the account.
    pub total: u32,
    /// Entries on this page.
    #[serde(default)]
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = r#"{"errno": 0, "result": {"total": 1, "data": ["x"]}}"#;
        let response: ApiResponse<Paged<String>> = serde_json::from_str(json).unwrap();
        assert!(response.is_ok());
        let paged = response.result.unwrap();
        assert_eq!(paged.total, 1);
        assert_eq!(paged.data, vec!["x".to_string()]);
    }

    #[test]
    fn test_failure_envelope() {
        let json = r#"{"errno": 40257, "msg": "device offline"}"#;
        let response: ApiResponse<Paged<String>> = serde_json::from_str(json).unwrap();
        assert!(!response.is_ok());
        assert_eq!(response.errno, 40257);
        assert_eq!(response.msg.as_deref(), Some("device offline"));
    }
}
