//! Scheduled key index rebuilds
//!
//! Each run lists every blob under a partition's prefix and replaces that
//! partition's index entry wholesale. Partitions are refreshed independently:
//! a failure in one is reported and never stops the others. Nothing is
//! retried within a run; the next scheduled tick is the retry.

use crate::device::DeviceClass;
use crate::error::RefreshError;
use crate::index::KeyIndex;
use crate::partition::{Partition, PartitionSet};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use wallpaper_store::{BlobStore, KeyIndexStore};

/// Result of refreshing one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RefreshOutcome {
    Updated { entries: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionRefresh {
    pub class: DeviceClass,
    pub index_name: String,
    pub outcome: RefreshOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub partitions: Vec<PartitionRefresh>,
}

impl RefreshReport {
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PartitionRefresh> {
        self.partitions
            .iter()
            .filter(|p| matches!(p.outcome, RefreshOutcome::Failed { .. }))
    }

    pub fn outcome_for(&self, class: DeviceClass) -> Option<&RefreshOutcome> {
        self.partitions
            .iter()
            .find(|p| p.class == class)
            .map(|p| &p.outcome)
    }
}

pub struct IndexRefresher {
    index_store: Arc<dyn KeyIndexStore>,
    blob_store: Arc<dyn BlobStore>,
    partitions: PartitionSet,
}

impl IndexRefresher {
    pub fn new(
        index_store: Arc<dyn KeyIndexStore>,
        blob_store: Arc<dyn BlobStore>,
        partitions: PartitionSet,
    ) -> Self {
        Self {
            index_store,
            blob_store,
            partitions,
        }
    }

    /// Rebuild every partition's index.
    pub async fn refresh_all(&self) -> RefreshReport {
        let started_at = Utc::now();

        let partitions = join_all(self.partitions.iter().map(|partition| async move {
            let outcome = match self.refresh_partition(partition).await {
                Ok(entries) => {
                    info!(
                        class = %partition.class,
                        index = %partition.index_name,
                        entries,
                        "Updated key index"
                    );
                    RefreshOutcome::Updated { entries }
                }
                Err(e) => {
                    error!(
                        class = %partition.class,
                        index = %partition.index_name,
                        error = %e,
                        "Failed to refresh key index"
                    );
                    RefreshOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            PartitionRefresh {
                class: partition.class,
                index_name: partition.index_name.clone(),
                outcome,
            }
        }))
        .await;

        RefreshReport {
            started_at,
            finished_at: Utc::now(),
            partitions,
        }
    }

    async fn refresh_partition(&self, partition: &Partition) -> Result<usize, RefreshError> {
        let keys = self
            .blob_store
            .list_all(&partition.prefix)
            .await
            .map_err(RefreshError::List)?;
        let index = KeyIndex::new(keys);
        let value = index.to_json().map_err(RefreshError::Encode)?;

        self.index_store
            .put(&partition.index_name, value)
            .await
            .map_err(RefreshError::Write)?;

        Ok(index.len())
    }

    /// One scheduled run: refresh and log the report
    pub async fn run_scheduled(&self) -> RefreshReport {
        info!("Scheduled refresh: rebuilding key indexes from the blob store");
        let report = self.refresh_all().await;

        if report.has_failures() {
            warn!(
                failed = report.failures().count(),
                total = report.partitions.len(),
                "Key index refresh finished with failures; retrying on next tick"
            );
        } else {
            info!(
                elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "Key index refresh complete"
            );
        }

        report
    }
}

/// Shortest period the schedule will run at
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Run `refresher` every `every`, starting now when `run_immediately` is set.
/// Periods below [`MIN_REFRESH_INTERVAL`] are raised to it.
///
/// Each run is its own task, so a slow refresh may overlap the next tick.
/// Overlapping runs are harmless: every index write replaces the whole value
/// and the last one wins.
pub fn spawn_refresh_schedule(
    refresher: Arc<IndexRefresher>,
    every: Duration,
    run_immediately: bool,
) -> JoinHandle<()> {
    if every < MIN_REFRESH_INTERVAL {
        warn!(
            requested_ms = every.as_millis() as u64,
            "Refresh interval too short, using minimum of {:?}",
            MIN_REFRESH_INTERVAL
        );
    }
    let every = every.max(MIN_REFRESH_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        if !run_immediately {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            let refresher = refresher.clone();
            tokio::spawn(async move {
                refresher.run_scheduled().await;
            });
        }
    })
}
