//! Fetch-and-merge service across upstream credentials.
//!
//! Each configured credential scopes a disjoint set of monitors under the
//! same provider, so one fetch+aggregate cycle runs per credential and the
//! resulting lists are concatenated without de-duplication. The merge is
//! fail-fast: any credential failing fails the whole batch, and the first
//! error's message surfaces verbatim.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::info;

use crate::aggregation::aggregate_monitor;
use crate::error::Error;
use crate::model::AggregatedMonitor;
use crate::ranges::RangePlan;
use crate::upstream::UptimeRobotClient;

/// Issues concurrent per-credential fetches and merges the results.
#[derive(Clone)]
pub struct MonitorService {
    client: UptimeRobotClient,
    api_keys: Arc<Vec<String>>,
}

impl MonitorService {
    /// Create a service over the given client and credential list.
    pub fn new(client: UptimeRobotClient, api_keys: Vec<String>) -> Self {
        Self {
            client,
            api_keys: Arc::new(api_keys),
        }
    }

    /// Fetch and aggregate monitors for every credential concurrently.
    ///
    /// Errors deterministically with [`Error::Configuration`] when no
    /// credential is configured. Per-credential fetches run concurrently
    /// with no ordering guarantee between them; the merged list keeps
    /// credential order.
    pub async fn fetch_all(
        &self,
        days: u32,
        today: DateTime<Utc>,
    ) -> Result<Vec<AggregatedMonitor>, Error> {
        if self.api_keys.is_empty() {
            return Err(Error::Configuration);
        }

        let plan = RangePlan::build(days, today);
        let plan_ref = &plan;

        info!(
            credentials = self.api_keys.len(),
            days, "Fetching monitors from upstream"
        );

        let fetches = self.api_keys.iter().map(|key| async move {
            self.client.get_monitors(key, plan_ref).await
        });

        let per_credential = try_join_all(fetches).await?;

        let monitors: Vec<AggregatedMonitor> = per_credential
            .into_iter()
            .flatten()
            .map(|raw| aggregate_monitor(raw, &plan))
            .collect();

        info!(monitors = monitors.len(), "Aggregation complete");

        Ok(monitors)
    }
}
