//! Upstat - uptime-monitoring aggregation and a cached public API.
//!
//! # Overview
//!
//! Upstat fetches raw status and event-log data from an uptime-monitoring
//! provider, reshapes it into per-day availability timelines, and re-exposes
//! the result to third-party consumers through a small public gateway that
//! adds caching, rate limiting, CORS policy and optional API-key gating on
//! top of the upstream credentials.
//!
//! All calendar-day math is UTC-fixed: an outage belongs to the UTC day
//! containing its timestamp, and day boundaries are half-open `[start, end)`.
//!
//! # Modules
//!
//! - [`model`]: Data types for aggregated monitors, buckets and statistics
//! - [`ranges`]: Date-range planning and the provider's packed wire formats
//! - [`upstream`]: Client for the provider's monitor-listing API
//! - [`aggregation`]: Logic for bucketing outages into daily timelines
//! - [`service`]: Concurrent fetch-and-merge across upstream credentials
//! - [`gateway`]: Public HTTP API with caching, rate limiting and CORS
//! - [`config`]: Environment-supplied configuration
//! - [`error`]: Error taxonomy shared by the core and the gateway

pub mod aggregation;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod ranges;
pub mod service;
pub mod upstream;
