//! UptimeRobot API client.
//!
//! One fetch cycle issues a single form-encoded POST per credential asking
//! for the monitor list, the event logs for the window, pre-aggregated
//! uptime percentages for the planned ranges, and a capped number of
//! response-time samples.
//!
//! # API Reference
//!
//! See: <https://uptimerobot.com/api/>

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::ranges::RangePlan;

/// The provider's getMonitors endpoint.
const UPTIMEROBOT_API_BASE: &str = "https://api.uptimerobot.com/v2/getMonitors";

/// Upstream requests that take longer than this surface as fetch failures.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Response-time samples requested per monitor. Kept small because the
/// provider's payload grows quickly with this value.
const RESPONSE_TIMES_LIMIT: u32 = 12;

/// Client for the provider's monitor-listing API.
#[derive(Clone)]
pub struct UptimeRobotClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for UptimeRobotClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeRobotClient {
    /// Create a new client against the provider's production endpoint.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: UPTIMEROBOT_API_BASE.to_string(),
        }
    }

    /// Create a new client with a custom endpoint (for testing, or when the
    /// deployment fronts the provider with its own proxy).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Fetch raw monitor records for one credential and one range plan.
    ///
    /// A non-"ok" `stat` in the response body is a hard failure carrying
    /// the provider's message; network errors and timeouts surface the same
    /// way.
    pub async fn get_monitors(
        &self,
        api_key: &str,
        plan: &RangePlan,
    ) -> Result<Vec<RawMonitor>, Error> {
        let params = [
            ("api_key", api_key.to_string()),
            ("format", "json".to_string()),
            ("logs", "1".to_string()),
            ("log_types", "1-2".to_string()),
            ("logs_start_date", plan.total.start.to_string()),
            ("logs_end_date", plan.total.end.to_string()),
            ("custom_uptime_ranges", plan.to_query_string()),
            ("response_times", "1".to_string()),
            ("response_times_limit", RESPONSE_TIMES_LIMIT.to_string()),
        ];

        let response = self
            .client
            .post(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .form(&params)
            .send()
            .await?;

        let data = response.json::<GetMonitorsResponse>().await?;
        into_monitors(data)
    }
}

/// Reject non-"ok" responses, surfacing the provider's message verbatim.
fn into_monitors(data: GetMonitorsResponse) -> Result<Vec<RawMonitor>, Error> {
    if data.stat != "ok" {
        let message = data
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| "API 请求失败".to_string());
        return Err(Error::upstream(message));
    }
    Ok(data.monitors)
}

// ============================================================================
// Response types
// ============================================================================

/// Top-level response from the getMonitors endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GetMonitorsResponse {
    /// "ok" on success; anything else is a hard failure.
    #[serde(default)]
    pub stat: String,

    /// Error details when `stat` is not "ok".
    pub error: Option<ApiError>,

    /// The monitor records visible to the credential.
    #[serde(default)]
    pub monitors: Vec<RawMonitor>,
}

/// Provider-reported error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub kind: String,

    pub message: Option<String>,
}

/// A raw monitor record as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMonitor {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub friendly_name: String,

    #[serde(default)]
    pub url: String,

    /// Raw status code: 0=paused, 1=not checked, 2=up, 8=seems down, 9=down.
    #[serde(default)]
    pub status: i64,

    /// Packed percentages for the requested ranges, combined range last.
    #[serde(default)]
    pub custom_uptime_ranges: String,

    /// Event log for the requested window.
    #[serde(default)]
    pub logs: Vec<RawLog>,

    /// Sampled response times, newest first.
    pub response_times: Option<Vec<RawResponseTime>>,

    /// Window-average response time in milliseconds, string-typed on the
    /// wire.
    pub average_response_time: Option<String>,
}

/// A raw event log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLog {
    /// 1=down, 2=up, 98=started, 99=paused.
    #[serde(default, rename = "type")]
    pub log_type: i64,

    /// Unix timestamp (seconds) of the transition.
    #[serde(default)]
    pub datetime: i64,

    /// Duration of the state in seconds.
    #[serde(default)]
    pub duration: i64,

    pub reason: Option<RawLogReason>,
}

/// Reason details attached to a log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLogReason {
    pub code: Option<String>,
    pub detail: Option<String>,
}

/// A raw response-time sample.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponseTime {
    #[serde(default)]
    pub datetime: i64,

    /// Response time in milliseconds.
    #[serde(default)]
    pub value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_monitor_response() {
        let body = r#"{
            "stat": "ok",
            "monitors": [
                {
                    "id": 777,
                    "friendly_name": "Homepage",
                    "url": "https://example.com",
                    "status": 2,
                    "custom_uptime_ranges": "100-99.5-100",
                    "logs": [
                        {
                            "type": 1,
                            "datetime": 1704844800,
                            "duration": 300,
                            "reason": { "code": "521", "detail": "Web Server Is Down" }
                        }
                    ],
                    "response_times": [ { "datetime": 1704844800, "value": 182 } ],
                    "average_response_time": "190.25"
                }
            ]
        }"#;

        let parsed: GetMonitorsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.stat, "ok");

        let monitor = &parsed.monitors[0];
        assert_eq!(monitor.id, 777);
        assert_eq!(monitor.friendly_name, "Homepage");
        assert_eq!(monitor.status, 2);
        assert_eq!(monitor.logs[0].log_type, 1);
        assert_eq!(monitor.logs[0].duration, 300);
        assert_eq!(
            monitor.logs[0].reason.as_ref().unwrap().detail.as_deref(),
            Some("Web Server Is Down")
        );
        assert_eq!(monitor.response_times.as_ref().unwrap()[0].value, 182);
        assert_eq!(monitor.average_response_time.as_deref(), Some("190.25"));
    }

    #[test]
    fn test_deserialize_minimal_monitor() {
        let body = r#"{ "stat": "ok", "monitors": [ { "id": 1 } ] }"#;

        let parsed: GetMonitorsResponse = serde_json::from_str(body).unwrap();
        let monitor = &parsed.monitors[0];

        assert!(monitor.logs.is_empty());
        assert!(monitor.response_times.is_none());
        assert!(monitor.average_response_time.is_none());
    }

    #[test]
    fn test_non_ok_stat_is_a_hard_failure() {
        let body = r#"{
            "stat": "fail",
            "error": { "type": "invalid_parameter", "message": "api_key is invalid" }
        }"#;

        let parsed: GetMonitorsResponse = serde_json::from_str(body).unwrap();
        let err = into_monitors(parsed).unwrap_err();

        assert_eq!(err.to_string(), "api_key is invalid");
    }

    #[test]
    fn test_non_ok_stat_without_message_uses_default() {
        let body = r#"{ "stat": "fail" }"#;

        let parsed: GetMonitorsResponse = serde_json::from_str(body).unwrap();
        let err = into_monitors(parsed).unwrap_err();

        assert_eq!(err.to_string(), "API 请求失败");
    }
}
