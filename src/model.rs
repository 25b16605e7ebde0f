//! Data models for Upstat.
//!
//! These types describe the shape of aggregated monitor data as served to
//! API consumers. Raw provider wire types live in [`crate::upstream`]; the
//! types here are rebuilt fresh on every fetch cycle and never mutated
//! incrementally.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Truncate a percentage to two decimals.
///
/// The provider reports uptime as decimal percentages; the contract calls
/// for truncation (`floor(x * 100) / 100`), not rounding, so that a day
/// shows 100% only when it was fully healthy.
pub fn truncate_percent(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// Coarse status of a monitor, derived from the provider's raw status code.
///
/// Mapping: 2 → `Ok`; 8 or 9 → `Down`; 0 → `Paused`; anything else →
/// `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    /// The monitor is up.
    Ok,
    /// The monitor is down or seems down.
    Down,
    /// Monitoring is paused.
    Paused,
    /// Any status code outside the fixed mapping.
    Unknown,
}

impl MonitorStatus {
    /// Map the provider's raw status code onto the coarse status enum.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => MonitorStatus::Ok,
            8 | 9 => MonitorStatus::Down,
            0 => MonitorStatus::Paused,
            _ => MonitorStatus::Unknown,
        }
    }
}

/// Event-type taxonomy of provider log entries.
///
/// Only [`LogKind::Down`] events carry a meaningful duration and take part
/// in outage aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// The monitor went down (type code 1).
    Down,
    /// The monitor came back up (type code 2).
    Up,
    /// Monitoring started (type code 98).
    Started,
    /// Monitoring was paused (type code 99).
    Paused,
    /// Any other type code.
    Other,
}

impl LogKind {
    /// Map the provider's numeric log type onto the taxonomy.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => LogKind::Down,
            2 => LogKind::Up,
            98 => LogKind::Started,
            99 => LogKind::Paused,
            _ => LogKind::Other,
        }
    }
}

/// A single provider log entry, immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutageEvent {
    /// What kind of transition this entry records.
    pub kind: LogKind,

    /// Unix timestamp (seconds) of the transition.
    pub datetime: i64,

    /// Duration of the state in seconds. Only meaningful for down events.
    pub duration_seconds: i64,

    /// Provider reason code, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,

    /// Provider reason detail, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_detail: Option<String>,
}

impl OutageEvent {
    /// Whether this event is a down transition that should be aggregated.
    pub fn is_down(&self) -> bool {
        self.kind == LogKind::Down
    }
}

/// One calendar day's worth of availability data for one monitor.
///
/// Buckets are ordered newest-first and there is exactly one per requested
/// day. `uptime_percent` preserves the provider's value truncated to two
/// decimals; downstream consumers treat exactly 100 as "fully healthy".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBucket {
    /// The UTC calendar day this bucket covers.
    pub date: NaiveDate,

    /// Uptime percentage for the day, 0–100, truncated to two decimals.
    pub uptime_percent: f64,

    /// Number of outages attributed to this day.
    pub outage_count: u32,

    /// Total outage duration attributed to this day, in seconds.
    pub outage_duration_seconds: i64,
}

impl DailyBucket {
    /// An empty bucket for a day with the given uptime value.
    pub fn new(date: NaiveDate, uptime_percent: f64) -> Self {
        Self {
            date,
            uptime_percent,
            outage_count: 0,
            outage_duration_seconds: 0,
        }
    }
}

/// Running outage totals over the whole requested window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutageTotals {
    /// Number of outages in the window.
    pub count: u32,

    /// Total outage duration in the window, in seconds.
    pub duration_seconds: i64,
}

/// A sampled response time from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimeSample {
    /// Unix timestamp (seconds) of the sample.
    pub datetime: i64,

    /// Response time in milliseconds.
    pub value_ms: i64,
}

/// A fully aggregated monitor: status, per-day availability timeline and
/// outage totals for the requested window.
///
/// Rebuilt fresh on every fetch; `daily` is newest-first with length equal
/// to the requested day count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMonitor {
    /// Provider-assigned monitor id.
    pub id: u64,

    /// Display name of the monitor.
    pub name: String,

    /// The monitored URL.
    pub url: String,

    /// Coarse current status.
    pub status: MonitorStatus,

    /// Average uptime percentage over the whole window, truncated to two
    /// decimals.
    pub average_uptime_percent: f64,

    /// Per-day availability buckets, newest first.
    pub daily: Vec<DailyBucket>,

    /// Outage totals over the whole window.
    pub totals: OutageTotals,

    /// The raw provider log entries for the window.
    pub logs: Vec<OutageEvent>,

    /// Sampled response times, when the provider returned any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_times: Option<Vec<ResponseTimeSample>>,

    /// Average response time in milliseconds, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time_ms: Option<f64>,
}

/// Summary statistics over the current monitor set.
///
/// Recomputed fresh on every change, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Total number of monitors.
    pub total: usize,

    /// Monitors currently up.
    pub up: usize,

    /// Monitors currently down.
    pub down: usize,

    /// Monitors currently paused.
    pub paused: usize,

    /// Average of per-monitor window averages, truncated to two decimals.
    /// Zero when the monitor list is empty.
    pub average_uptime_percent: f64,
}

impl GlobalStats {
    /// Reduce a monitor list into summary statistics.
    pub fn from_monitors(monitors: &[AggregatedMonitor]) -> Self {
        let total = monitors.len();
        let up = monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Ok)
            .count();
        let down = monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Down)
            .count();
        let paused = monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Paused)
            .count();

        let average_uptime_percent = if total > 0 {
            let sum: f64 = monitors.iter().map(|m| m.average_uptime_percent).sum();
            truncate_percent(sum / total as f64)
        } else {
            0.0
        };

        Self {
            total,
            up,
            down,
            paused,
            average_uptime_percent,
        }
    }
}

/// A down event flattened into a cross-monitor incident feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// Stable id of the form `{monitor_id}-{log_index}`.
    pub id: String,

    /// The monitor the incident belongs to.
    pub monitor_id: u64,

    /// Display name of that monitor.
    pub monitor_name: String,

    /// Unix timestamp (seconds) when the monitor went down.
    pub datetime: i64,

    /// Outage duration in seconds.
    pub duration_seconds: i64,

    /// Provider reason detail, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
