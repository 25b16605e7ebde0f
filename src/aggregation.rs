//! Aggregation logic: provider records into per-day availability timelines.
//!
//! The aggregator owns the bucketing rules: a down event lands in the
//! bucket whose UTC calendar day contains its timestamp, day boundaries are
//! half-open `[start, end)`, and events outside the requested window are
//! dropped silently. Everything is rebuilt from scratch on each fetch;
//! nothing here mutates previous results.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{
    AggregatedMonitor, DailyBucket, IncidentEvent, LogKind, MonitorStatus, OutageEvent,
    OutageTotals, ResponseTimeSample,
};
use crate::ranges::{RangePlan, UptimeRanges, utc_day};
use crate::upstream::{RawLog, RawMonitor};

/// Build one [`AggregatedMonitor`] from a raw provider record and the range
/// plan that was used to request it.
pub fn aggregate_monitor(raw: RawMonitor, plan: &RangePlan) -> AggregatedMonitor {
    let ranges = UptimeRanges::decode(&raw.custom_uptime_ranges, plan.days);

    let dates = plan.day_dates();
    let index_by_day: HashMap<NaiveDate, usize> = dates
        .iter()
        .enumerate()
        .map(|(index, date)| (*date, index))
        .collect();

    let mut daily: Vec<DailyBucket> = dates
        .iter()
        .zip(ranges.daily.iter())
        .map(|(date, uptime)| DailyBucket::new(*date, *uptime))
        .collect();

    let logs: Vec<OutageEvent> = raw.logs.iter().map(convert_log).collect();

    let mut totals = OutageTotals::default();
    for event in &logs {
        if !event.is_down() {
            continue;
        }
        // Events outside the combined window don't count anywhere
        if !plan.total.contains(event.datetime) {
            continue;
        }

        totals.count += 1;
        totals.duration_seconds += event.duration_seconds;

        if let Some(day) = utc_day(event.datetime) {
            if let Some(&index) = index_by_day.get(&day) {
                daily[index].outage_count += 1;
                daily[index].outage_duration_seconds += event.duration_seconds;
            }
        }
    }

    let response_times = raw.response_times.map(|samples| {
        samples
            .into_iter()
            .map(|sample| ResponseTimeSample {
                datetime: sample.datetime,
                value_ms: sample.value,
            })
            .collect()
    });

    let average_response_time_ms = raw
        .average_response_time
        .as_deref()
        .and_then(|value| value.parse::<f64>().ok());

    AggregatedMonitor {
        id: raw.id,
        name: raw.friendly_name,
        url: raw.url,
        status: MonitorStatus::from_code(raw.status),
        average_uptime_percent: ranges.average,
        daily,
        totals,
        logs,
        response_times,
        average_response_time_ms,
    }
}

/// Flatten all down events across monitors into a recent-incidents feed,
/// newest first, truncated to `limit`.
pub fn recent_incidents(monitors: &[AggregatedMonitor], limit: usize) -> Vec<IncidentEvent> {
    let mut events: Vec<IncidentEvent> = Vec::new();

    for monitor in monitors {
        for (index, log) in monitor.logs.iter().enumerate() {
            if !log.is_down() {
                continue;
            }
            events.push(IncidentEvent {
                id: format!("{}-{}", monitor.id, index),
                monitor_id: monitor.id,
                monitor_name: monitor.name.clone(),
                datetime: log.datetime,
                duration_seconds: log.duration_seconds,
                reason: log.reason_detail.clone(),
            });
        }
    }

    events.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    events.truncate(limit);
    events
}

fn convert_log(raw: &RawLog) -> OutageEvent {
    OutageEvent {
        kind: LogKind::from_code(raw.log_type),
        datetime: raw.datetime,
        duration_seconds: raw.duration,
        reason_code: raw.reason.as_ref().and_then(|r| r.code.clone()),
        reason_detail: raw.reason.as_ref().and_then(|r| r.detail.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn plan(days: u32) -> RangePlan {
        RangePlan::build(days, Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap())
    }

    fn raw_monitor(ranges: &str, logs: Vec<RawLog>) -> RawMonitor {
        RawMonitor {
            id: 42,
            friendly_name: "Homepage".to_string(),
            url: "https://example.com".to_string(),
            status: 2,
            custom_uptime_ranges: ranges.to_string(),
            logs,
            response_times: None,
            average_response_time: None,
        }
    }

    fn down_log(datetime: i64, duration: i64) -> RawLog {
        RawLog {
            log_type: 1,
            datetime,
            duration,
            reason: None,
        }
    }

    #[test]
    fn test_three_day_example() {
        let plan = plan(3);
        let monitor = aggregate_monitor(raw_monitor("100-100-0-95.5", vec![]), &plan);

        let uptimes: Vec<f64> = monitor.daily.iter().map(|b| b.uptime_percent).collect();
        assert_eq!(uptimes, vec![100.0, 100.0, 0.0]);
        assert_eq!(monitor.average_uptime_percent, 95.5);
        assert_eq!(monitor.daily.len(), 3);
    }

    #[test]
    fn test_down_event_lands_in_its_day_bucket() {
        let plan = plan(3);
        // Noon of the middle day (bucket index 1)
        let noon = plan.daily[1].start + 43_200;
        let monitor = aggregate_monitor(
            raw_monitor("100-99.5-100-99.83", vec![down_log(noon, 120)]),
            &plan,
        );

        assert_eq!(monitor.daily[1].outage_count, 1);
        assert_eq!(monitor.daily[1].outage_duration_seconds, 120);
        assert_eq!(monitor.daily[0].outage_count, 0);
        assert_eq!(monitor.daily[2].outage_count, 0);
        // The running total mirrors the bucket increment
        assert_eq!(monitor.totals.count, 1);
        assert_eq!(monitor.totals.duration_seconds, 120);
    }

    #[test]
    fn test_boundary_event_belongs_to_the_day_starting_there() {
        let plan = plan(3);
        // Exactly midnight at the start of bucket 1
        let boundary = plan.daily[1].start;
        let monitor = aggregate_monitor(
            raw_monitor("100-100-100-100", vec![down_log(boundary, 60)]),
            &plan,
        );

        assert_eq!(monitor.daily[1].outage_count, 1);
        assert_eq!(monitor.daily[2].outage_count, 0);
    }

    #[test]
    fn test_event_before_window_is_ignored_entirely() {
        let plan = plan(3);
        let before = plan.total.start - 1;
        let monitor = aggregate_monitor(
            raw_monitor("100-100-100-100", vec![down_log(before, 999)]),
            &plan,
        );

        assert_eq!(monitor.totals.count, 0);
        assert_eq!(monitor.totals.duration_seconds, 0);
        assert!(monitor.daily.iter().all(|b| b.outage_count == 0));
    }

    #[test]
    fn test_up_events_are_not_counted() {
        let plan = plan(2);
        let up = RawLog {
            log_type: 2,
            datetime: plan.daily[0].start + 100,
            duration: 500,
            reason: None,
        };
        let monitor = aggregate_monitor(raw_monitor("100-100-100", vec![up]), &plan);

        assert_eq!(monitor.totals.count, 0);
        assert_eq!(monitor.daily[0].outage_count, 0);
        // The raw log is still carried through
        assert_eq!(monitor.logs.len(), 1);
        assert_eq!(monitor.logs[0].kind, LogKind::Up);
    }

    #[test]
    fn test_zero_logs_yields_zero_buckets_and_status_from_code() {
        let plan = plan(2);
        let mut raw = raw_monitor("99.75-100-99.87", vec![]);
        raw.status = 9;

        let monitor = aggregate_monitor(raw, &plan);

        assert_eq!(monitor.status, MonitorStatus::Down);
        assert!(monitor.daily.iter().all(|b| b.outage_count == 0));
        assert_eq!(monitor.daily[0].uptime_percent, 99.75);
    }

    #[test]
    fn test_response_time_carry_through() {
        let plan = plan(2);
        let mut raw = raw_monitor("100-100-100", vec![]);
        raw.response_times = Some(vec![crate::upstream::RawResponseTime {
            datetime: plan.daily[0].start,
            value: 182,
        }]);
        raw.average_response_time = Some("190.25".to_string());

        let monitor = aggregate_monitor(raw, &plan);

        assert_eq!(monitor.response_times.as_ref().unwrap()[0].value_ms, 182);
        assert_eq!(monitor.average_response_time_ms, Some(190.25));
    }

    #[test]
    fn test_unparseable_average_response_time_is_none() {
        let plan = plan(2);
        let mut raw = raw_monitor("100-100-100", vec![]);
        raw.average_response_time = Some("n/a".to_string());

        let monitor = aggregate_monitor(raw, &plan);

        assert_eq!(monitor.average_response_time_ms, None);
    }

    #[test]
    fn test_recent_incidents_sorted_and_limited() {
        let plan = plan(3);
        let base = plan.daily[2].start;

        let reason = crate::upstream::RawLogReason {
            code: Some("521".to_string()),
            detail: Some("Web Server Is Down".to_string()),
        };
        let mut log_a = down_log(base + 100, 60);
        log_a.reason = Some(reason);

        let monitor_a = aggregate_monitor(raw_monitor("100-100-100-100", vec![log_a]), &plan);
        let monitor_b = aggregate_monitor(
            {
                let mut raw = raw_monitor(
                    "100-100-100-100",
                    vec![down_log(base + 500, 30), down_log(base + 300, 10)],
                );
                raw.id = 43;
                raw.friendly_name = "API".to_string();
                raw
            },
            &plan,
        );

        let incidents = recent_incidents(&[monitor_a.clone(), monitor_b.clone()], 10);

        assert_eq!(incidents.len(), 3);
        // Newest first across monitors
        assert_eq!(incidents[0].datetime, base + 500);
        assert_eq!(incidents[0].monitor_name, "API");
        assert_eq!(incidents[2].id, "42-0");
        assert_eq!(incidents[2].reason.as_deref(), Some("Web Server Is Down"));

        let limited = recent_incidents(&[monitor_a, monitor_b], 2);
        assert_eq!(limited.len(), 2);
    }
}
