//! Date-range planning and the provider's packed wire formats.
//!
//! The provider pre-aggregates uptime percentages for caller-supplied unix
//! time ranges. One fetch cycle requests `days` calendar-day ranges (newest
//! first) plus a single combined range spanning the whole window, and gets
//! back a `-`-joined string of decimal percentages in the same order.
//!
//! All day math here is UTC-fixed: a bucket's calendar day is the UTC day
//! containing the instant, and day boundaries follow `[start, end)`.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::truncate_percent;

/// Seconds in one UTC calendar day.
const DAY_SECONDS: i64 = 86_400;

/// A half-open unix-time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive start, unix seconds.
    pub start: i64,
    /// Exclusive end, unix seconds.
    pub end: i64,
}

impl DateRange {
    /// Whether the range contains the given instant.
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// The UTC calendar day containing a unix timestamp.
///
/// Returns `None` only for timestamps outside chrono's representable range.
pub fn utc_day(ts: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// The full set of ranges for one fetch cycle: `days` daily ranges ordered
/// newest-first, plus the combined range covering the whole window.
///
/// A plan is a pure function of `days` and "today"; `days` is validated to a
/// small fixed set before it reaches this type, so construction cannot fail.
#[derive(Debug, Clone)]
pub struct RangePlan {
    /// The requested day count.
    pub days: u32,
    /// One range per calendar day, newest first (today, yesterday, ...).
    pub daily: Vec<DateRange>,
    /// `[oldest day start, today + 1 day)`, exactly `days` days wide.
    pub total: DateRange,
}

impl RangePlan {
    /// Build the plan for `days` days ending at `today`.
    ///
    /// `today` is truncated to UTC midnight internally, so any instant of
    /// the current day yields the same plan.
    pub fn build(days: u32, today: DateTime<Utc>) -> Self {
        let midnight = today
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_else(|| today.timestamp() - today.timestamp().rem_euclid(DAY_SECONDS));

        let daily: Vec<DateRange> = (0..days as i64)
            .map(|d| {
                let start = midnight - d * DAY_SECONDS;
                DateRange {
                    start,
                    end: start + DAY_SECONDS,
                }
            })
            .collect();

        let total = DateRange {
            start: midnight - (days as i64 - 1) * DAY_SECONDS,
            end: midnight + DAY_SECONDS,
        };

        Self { days, daily, total }
    }

    /// Render the provider's `custom_uptime_ranges` request parameter:
    /// `start_end` pairs joined by `-`, daily ranges first, combined last.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self
            .daily
            .iter()
            .map(|r| format!("{}_{}", r.start, r.end))
            .collect();
        parts.push(format!("{}_{}", self.total.start, self.total.end));
        parts.join("-")
    }

    /// The UTC calendar days of the daily ranges, newest first.
    pub fn day_dates(&self) -> Vec<NaiveDate> {
        self.daily
            .iter()
            .filter_map(|r| utc_day(r.start))
            .collect()
    }
}

/// Decoded form of the provider's packed uptime-percentage string.
///
/// Modeled as an explicit decode/encode pair so the round-trip stays
/// checkable rather than being parsed ad hoc at the use site.
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeRanges {
    /// One percentage per requested day, in request order (newest first).
    pub daily: Vec<f64>,
    /// The combined-range percentage: the overall window average.
    pub average: f64,
}

impl UptimeRanges {
    /// Parse a `-`-joined percentage string into `days` daily values plus
    /// the trailing overall average.
    ///
    /// Missing or unparseable values decode as 0; every value is truncated
    /// (not rounded) to two decimals.
    pub fn decode(packed: &str, days: u32) -> Self {
        let mut values: Vec<f64> = packed
            .split('-')
            .map(|part| part.trim().parse().unwrap_or(0.0))
            .collect();

        // The combined-range value is appended last by the planner.
        let average = truncate_percent(values.pop().unwrap_or(0.0));

        let daily = (0..days as usize)
            .map(|i| truncate_percent(values.get(i).copied().unwrap_or(0.0)))
            .collect();

        Self { daily, average }
    }

    /// Render back into the provider's packed string form.
    pub fn encode(&self) -> String {
        let mut parts: Vec<String> = self.daily.iter().map(|v| v.to_string()).collect();
        parts.push(self.average.to_string());
        parts.join("-")
    }
}
