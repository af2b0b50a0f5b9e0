//! Hourly, daily and monthly JSON rollups
//!
//! Each bucket file holds cumulative download/upload totals per local and
//! per remote IP. Files are always read, merged and rewritten, so totals
//! accumulate across flushes and across process restarts. Merging the same
//! window twice counts it twice.

use crate::capture::aggregator::FlowMap;
use crate::report::Granularity;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Byte totals of one address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traffic {
    #[serde(default)]
    pub download: u64,
    #[serde(default)]
    pub upload: u64,
}

impl Traffic {
    fn add(&mut self, download: u64, upload: u64) {
        self.download = self.download.saturating_add(download);
        self.upload = self.upload.saturating_add(upload);
    }
}

/// On-disk document of one calendar bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrameReport {
    #[serde(default)]
    pub local: BTreeMap<String, Traffic>,
    #[serde(default)]
    pub remote: BTreeMap<String, Traffic>,
}

impl TimeFrameReport {
    /// Add every flow's counters to its local and remote entry
    pub fn merge(&mut self, flows: &FlowMap) {
        for flow in flows.values() {
            self.local
                .entry(flow.key.local_ip.clone())
                .or_default()
                .add(flow.download, flow.upload);
            self.remote
                .entry(flow.key.remote_ip.clone())
                .or_default()
                .add(flow.download, flow.upload);
        }
    }

    /// Read a report, treating a missing file as an empty report
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).await?;
        Ok(())
    }
}

/// Merges flushed windows into the bucket files under the data directory
#[derive(Debug, Clone)]
pub struct RollupWriter {
    data_dir: PathBuf,
}

impl RollupWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn file_path(&self, granularity: Granularity, window_start: DateTime<Utc>) -> PathBuf {
        self.data_dir
            .join(format!("{}.json", granularity.bucket(window_start)))
    }

    /// Read-merge-write one bucket file, returning the merged report
    pub async fn merge(
        &self,
        granularity: Granularity,
        window_start: DateTime<Utc>,
        flows: &FlowMap,
    ) -> Result<TimeFrameReport> {
        let path = self.file_path(granularity, window_start);
        let mut report = TimeFrameReport::load(&path).await?;
        report.merge(flows);
        report.save(&path).await?;

        debug!(
            "Merged {} flows into {} rollup {}",
            flows.len(),
            granularity,
            path.display()
        );
        Ok(report)
    }

    /// Merge a window into its hour, day and month buckets
    pub async fn merge_all(&self, window_start: DateTime<Utc>, flows: &FlowMap) -> Result<()> {
        for granularity in Granularity::ALL {
            self.merge(granularity, window_start, flows).await?;
        }
        Ok(())
    }
}
