//! Public API gateway: caching, rate limiting, CORS and API-key gating.
//!
//! The gateway wraps the aggregation service for third-party consumers.
//! Every data request walks the same ladder: CORS check (403), fixed-window
//! rate limit (429), optional API-key check (401), then cache-or-fetch
//! (200/500). The cache slot and rate-limit table are process-wide shared
//! state owned by [`Gateway`]; handlers receive the gateway by `State` and
//! time enters through explicit `now` arguments so the checks stay
//! testable.
//!
//! Client-facing message strings are kept verbatim from the previously
//! deployed service so existing consumers see identical bodies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::aggregation::recent_incidents;
use crate::error::Error;
use crate::model::{AggregatedMonitor, GlobalStats};
use crate::service::MonitorService;

/// Day windows consumers may request; anything else clamps to the default.
const VALID_DAYS: [u32; 4] = [7, 30, 60, 90];

/// Window used when `days` is missing or unrecognized.
const DEFAULT_DAYS: u32 = 30;

/// Incident feed length when `limit` is missing or unrecognized.
const DEFAULT_INCIDENT_LIMIT: usize = 20;

/// Upper bound on the incident feed length.
const MAX_INCIDENT_LIMIT: usize = 100;

/// Gateway configuration, environment-supplied and defaulted before it
/// reaches this module.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// CORS origin allow-list; `*` allows every origin.
    pub allowed_origins: Vec<String>,

    /// Requests per minute per client IP.
    pub rate_limit: u32,

    /// How long a cached response stays fresh, in seconds.
    pub cache_ttl_seconds: i64,

    /// Whether the API-key check is enforced.
    pub require_api_key: bool,

    /// Client API keys accepted when the check is enforced.
    pub api_keys: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            rate_limit: 60,
            cache_ttl_seconds: 300,
            require_api_key: false,
            api_keys: vec![],
        }
    }
}

/// The single shared cache slot: the last successful fetch and when it
/// happened. Overwritten on every successful refresh, never evicted.
struct CacheEntry {
    monitors: Arc<Vec<AggregatedMonitor>>,
    fetched_at: DateTime<Utc>,
}

/// Process-wide gateway state: configuration, the aggregation service, the
/// response cache and the rate-limit table. Constructed once and shared
/// across requests behind an [`Arc`].
pub struct Gateway {
    config: GatewayConfig,
    service: MonitorService,
    cache: Mutex<Option<CacheEntry>>,
    rate_limits: Mutex<HashMap<(String, i64), u32>>,
}

/// Recover the guard even if a previous holder panicked mid-update.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Gateway {
    /// Create a gateway over the given service.
    pub fn new(config: GatewayConfig, service: MonitorService) -> Self {
        Self {
            config,
            service,
            cache: Mutex::new(None),
            rate_limits: Mutex::new(HashMap::new()),
        }
    }

    /// CORS headers for the declared origin, or `None` when the origin is
    /// not allowed.
    ///
    /// A wildcard entry in the allow-list admits every request and echoes
    /// `*`; otherwise the declared origin must match an entry exactly and
    /// is echoed back.
    fn cors_headers(&self, origin: Option<&str>) -> Option<HeaderMap> {
        let allow_origin = if self.config.allowed_origins.iter().any(|o| o == "*") {
            "*".to_string()
        } else {
            origin
                .filter(|o| self.config.allowed_origins.iter().any(|a| a == o))?
                .to_string()
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_str(&allow_origin).ok()?,
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, X-API-Key"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
        Some(headers)
    }

    /// Count a request against the client's fixed per-minute window.
    ///
    /// Counters for minute buckets older than the previous one are purged
    /// opportunistically on each check.
    fn check_rate_limit(&self, client_ip: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let minute = now.timestamp().div_euclid(60);
        let mut table = lock(&self.rate_limits);

        let key = (client_ip.to_string(), minute);
        let count = table.get(&key).copied().unwrap_or(0);
        if count >= self.config.rate_limit {
            return Err(Error::RateLimited);
        }
        table.insert(key, count + 1);

        table.retain(|(_, bucket), _| *bucket >= minute - 1);

        Ok(())
    }

    /// Check the supplied API key against the configured allow-list.
    ///
    /// Only enforced when enabled; the error variants distinguish a missing
    /// key, an invalid key and an empty server-side allow-list.
    fn validate_api_key(&self, api_key: Option<&str>) -> Result<(), Error> {
        if !self.config.require_api_key {
            return Ok(());
        }
        let Some(api_key) = api_key else {
            return Err(Error::MissingApiKey);
        };
        if self.config.api_keys.is_empty() {
            return Err(Error::NoApiKeysConfigured);
        }
        if self.config.api_keys.iter().any(|k| k == api_key) {
            Ok(())
        } else {
            Err(Error::InvalidApiKey)
        }
    }

    /// Serve the monitor set from the cache slot, refreshing it when stale.
    ///
    /// Returns the monitors together with their fetch time. The slot is not
    /// re-validated against `days`: the gateway serves one fixed query
    /// shape. The lock never covers the upstream fetch, so two concurrent
    /// stale checks may both refresh; last write wins. A failed refresh
    /// leaves any existing entry untouched.
    async fn monitors_cached(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Arc<Vec<AggregatedMonitor>>, DateTime<Utc>), Error> {
        {
            let slot = lock(&self.cache);
            if let Some(entry) = slot.as_ref() {
                if now - entry.fetched_at < Duration::seconds(self.config.cache_ttl_seconds) {
                    return Ok((entry.monitors.clone(), entry.fetched_at));
                }
            }
        }

        let monitors = Arc::new(self.service.fetch_all(days, now).await?);

        let mut slot = lock(&self.cache);
        *slot = Some(CacheEntry {
            monitors: monitors.clone(),
            fetched_at: now,
        });

        Ok((monitors, now))
    }
}

/// Build the gateway router. Kept separate from `main` so integration
/// tests can mount the same routes.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(root).options(preflight).fallback(root))
        .route(
            "/api/monitors",
            get(get_monitors)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/stats",
            get(get_stats)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/incidents",
            get(get_incidents)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(gateway)
}

// ============================================================================
// Request plumbing
// ============================================================================

/// Query parameters for GET /api/monitors and /api/stats.
#[derive(Debug, Deserialize)]
struct WindowQuery {
    /// Requested day window; string-typed so unparseable input clamps
    /// instead of rejecting the request.
    days: Option<String>,
}

/// Query parameters for GET /api/incidents.
#[derive(Debug, Deserialize)]
struct IncidentsQuery {
    limit: Option<String>,
}

/// Clamp the `days` parameter to the accepted set, silently.
fn clamp_days(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .filter(|days| VALID_DAYS.contains(days))
        .unwrap_or(DEFAULT_DAYS)
}

/// Clamp the incident feed `limit` parameter, silently.
fn clamp_limit(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .map(|limit| limit.clamp(1, MAX_INCIDENT_LIMIT))
        .unwrap_or(DEFAULT_INCIDENT_LIMIT)
}

/// The client IP as seen through platform proxy headers.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|value| value.to_str().ok())
    {
        return ip.trim().to_string();
    }
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    "unknown".to_string()
}

fn origin_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
}

fn api_key_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
}

/// Render an error as the uniform `{success: false, error}` body.
///
/// Upstream and configuration failures additionally carry a timestamp, as
/// the deployed service did.
fn error_response(err: &Error, cors: Option<HeaderMap>, now: DateTime<Utc>) -> Response {
    let mut body = json!({ "success": false, "error": err.to_string() });
    if matches!(err, Error::Upstream { .. } | Error::Configuration) {
        body["timestamp"] = json!(now.timestamp_millis());
    }

    match cors {
        Some(headers) => (err.status_code(), headers, Json(body)).into_response(),
        None => (err.status_code(), Json(body)).into_response(),
    }
}

/// Run the CORS, rate-limit and API-key ladder for a data route.
///
/// Returns the CORS headers to attach on success, or the finished
/// rejection response.
fn admit(gateway: &Gateway, headers: &HeaderMap, now: DateTime<Utc>) -> Result<HeaderMap, Response> {
    let Some(cors) = gateway.cors_headers(origin_of(headers)) else {
        warn!(origin = ?origin_of(headers), "Rejected request from disallowed origin");
        return Err(error_response(&Error::OriginDenied, None, now));
    };

    let ip = client_ip(headers);
    if let Err(err) = gateway.check_rate_limit(&ip, now) {
        warn!(client_ip = %ip, "Rate limit exceeded");
        return Err(error_response(&err, Some(cors), now));
    }

    if let Err(err) = gateway.validate_api_key(api_key_of(headers)) {
        warn!(error = %err, "API key check failed");
        return Err(error_response(&err, Some(cors), now));
    }

    Ok(cors)
}

/// Wrap a successful payload in the response envelope, with CORS and
/// cache headers attached.
fn data_response(
    gateway: &Gateway,
    mut cors: HeaderMap,
    payload: serde_json::Value,
    fetched_at: DateTime<Utc>,
) -> Response {
    if let Ok(value) = HeaderValue::from_str(&format!(
        "public, max-age={}",
        gateway.config.cache_ttl_seconds
    )) {
        cors.insert(header::CACHE_CONTROL, value);
    }

    let body = json!({
        "success": true,
        "data": payload,
        "timestamp": fetched_at.timestamp_millis(),
    });
    (StatusCode::OK, cors, Json(body)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/monitors - the aggregated monitor list.
async fn get_monitors(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Query(query): Query<WindowQuery>,
) -> Response {
    let now = Utc::now();
    let cors = match admit(&gateway, &headers, now) {
        Ok(cors) => cors,
        Err(rejection) => return rejection,
    };

    let days = clamp_days(query.days.as_deref());
    match gateway.monitors_cached(days, now).await {
        Ok((monitors, fetched_at)) => {
            info!(monitors = monitors.len(), days, "Served monitor list");
            data_response(&gateway, cors, json!(&*monitors), fetched_at)
        }
        Err(err) => {
            warn!(error = %err, "Monitor fetch failed");
            error_response(&err, Some(cors), now)
        }
    }
}

/// GET /api/stats - summary statistics over the monitor set.
async fn get_stats(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Query(query): Query<WindowQuery>,
) -> Response {
    let now = Utc::now();
    let cors = match admit(&gateway, &headers, now) {
        Ok(cors) => cors,
        Err(rejection) => return rejection,
    };

    let days = clamp_days(query.days.as_deref());
    match gateway.monitors_cached(days, now).await {
        Ok((monitors, fetched_at)) => {
            let stats = GlobalStats::from_monitors(&monitors);
            data_response(&gateway, cors, json!(stats), fetched_at)
        }
        Err(err) => {
            warn!(error = %err, "Stats fetch failed");
            error_response(&err, Some(cors), now)
        }
    }
}

/// GET /api/incidents - recent down events across all monitors.
async fn get_incidents(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Query(query): Query<IncidentsQuery>,
) -> Response {
    let now = Utc::now();
    let cors = match admit(&gateway, &headers, now) {
        Ok(cors) => cors,
        Err(rejection) => return rejection,
    };

    let limit = clamp_limit(query.limit.as_deref());
    match gateway.monitors_cached(DEFAULT_DAYS, now).await {
        Ok((monitors, fetched_at)) => {
            let incidents = recent_incidents(&monitors, limit);
            data_response(&gateway, cors, json!(incidents), fetched_at)
        }
        Err(err) => {
            warn!(error = %err, "Incident fetch failed");
            error_response(&err, Some(cors), now)
        }
    }
}

/// GET / - self-describing API documentation. Always 200; CORS headers are
/// attached only when the origin is allowed.
async fn root(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    let config = &gateway.config;

    let docs = json!({
        "name": "Upstat Public API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "提供公开的监控状态数据 API",
        "endpoints": {
            "/api/monitors": {
                "method": "GET",
                "description": "获取所有监控项的状态数据",
                "parameters": {
                    "days": {
                        "type": "number",
                        "description": "获取天数（7, 30, 60, 90）",
                        "default": DEFAULT_DAYS,
                    },
                },
                "headers": {
                    "X-API-Key": {
                        "description": "API 密钥（如果启用）",
                        "required": config.require_api_key,
                    },
                },
                "response": {
                    "success": "boolean",
                    "data": "Array<Monitor>",
                    "timestamp": "number",
                },
            },
            "/api/stats": {
                "method": "GET",
                "description": "获取全局统计数据",
                "parameters": {
                    "days": {
                        "type": "number",
                        "description": "获取天数（7, 30, 60, 90）",
                        "default": DEFAULT_DAYS,
                    },
                },
            },
            "/api/incidents": {
                "method": "GET",
                "description": "获取最近的故障事件",
                "parameters": {
                    "limit": {
                        "type": "number",
                        "description": format!("返回数量（1-{}）", MAX_INCIDENT_LIMIT),
                        "default": DEFAULT_INCIDENT_LIMIT,
                    },
                },
            },
        },
        "monitor": {
            "id": "number",
            "name": "string",
            "url": "string",
            "status": "'ok' | 'down' | 'paused' | 'unknown'",
            "average_uptime_percent": "number",
            "daily": "Array<{ date, uptime_percent, outage_count, outage_duration_seconds }>",
            "totals": "{ count, duration_seconds }",
            "logs": "Array<{ kind, datetime, duration_seconds, reason_code?, reason_detail? }>",
            "average_response_time_ms": "number | undefined",
        },
        "authentication": (if config.require_api_key {
            "需要 API 密钥，请在请求头中添加 X-API-Key"
        } else {
            "无需认证"
        }),
        "rateLimit": format!("每分钟 {} 次请求", config.rate_limit),
        "cache": format!("缓存时间 {} 秒", config.cache_ttl_seconds),
    });

    match gateway.cors_headers(origin_of(&headers)) {
        Some(cors) => (StatusCode::OK, cors, Json(docs)).into_response(),
        None => (StatusCode::OK, Json(docs)).into_response(),
    }
}

/// OPTIONS preflight: 204 with CORS headers, or a bare 403.
async fn preflight(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    match gateway.cors_headers(origin_of(&headers)) {
        Some(cors) => (StatusCode::NO_CONTENT, cors).into_response(),
        None => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Non-GET methods on known API routes.
async fn method_not_allowed(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    let body = json!({ "success": false, "error": "方法不允许" });
    match gateway.cors_headers(origin_of(&headers)) {
        Some(cors) => (StatusCode::METHOD_NOT_ALLOWED, cors, Json(body)).into_response(),
        None => (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response(),
    }
}

/// Every unmatched path; also answers stray OPTIONS preflights.
async fn not_found(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method == Method::OPTIONS {
        return preflight(State(gateway), headers).await;
    }

    let body = json!({ "success": false, "error": "未找到端点" });
    match gateway.cors_headers(origin_of(&headers)) {
        Some(cors) => (StatusCode::NOT_FOUND, cors, Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(body)).into_response(),
    }
}
