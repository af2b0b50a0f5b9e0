//! Report writers and the per-window flush sequence

pub mod csv;
pub mod rollup;

use crate::capture::{compact, ClassifiedPacket};
use crate::resolver::{HostNameResolver, ReverseLookup};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub use csv::CsvWriter;
pub use rollup::{RollupWriter, TimeFrameReport, Traffic};

/// Calendar bucket of a rollup file, always computed in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Hour, Granularity::Day, Granularity::Month];

    pub const fn format(&self) -> &'static str {
        match self {
            Granularity::Hour => "%Y-%m-%dT%H",
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
        }
    }

    /// Bucket name of `ts`, e.g. `2019-10-27T13`, `2019-10-27` or `2019-10`
    pub fn bucket(&self, ts: DateTime<Utc>) -> String {
        ts.format(self.format()).to_string()
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ISO-8601 instant with fractional seconds only when non-zero
pub fn format_instant(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// What a flush wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub window_start: DateTime<Utc>,
    pub flows: usize,
    pub bytes: u64,
}

/// Turns one reporting window into CSV lines, rollup merges and cached
/// host names
pub struct Reporter<L> {
    resolver: HostNameResolver<L>,
    csv: CsvWriter,
    rollups: RollupWriter,
}

impl<L: ReverseLookup> Reporter<L> {
    pub fn new(data_dir: &Path, resolver: HostNameResolver<L>) -> Self {
        Self {
            resolver,
            csv: CsvWriter::new(data_dir),
            rollups: RollupWriter::new(data_dir),
        }
    }

    /// Report a window; an empty window writes nothing.
    ///
    /// All bucket files are chosen from the first packet's timestamp.
    pub async fn report(&mut self, packets: &[ClassifiedPacket]) -> Result<Option<FlushSummary>> {
        let Some(first) = packets.first() else {
            return Ok(None);
        };
        let window_start = first.timestamp;

        let flows = compact(packets);

        let local_ips: BTreeSet<&str> = flows.keys().map(|key| key.local_ip.as_str()).collect();
        let names = self.resolver.resolve_ips(&local_ips).await?;
        for (ip, name) in local_ips.iter().zip(&names) {
            debug!("Local host {} is {}", ip, name);
        }

        self.csv.append(window_start, &flows).await?;
        self.rollups.merge_all(window_start, &flows).await?;

        let bytes = flows
            .values()
            .fold(0u64, |total, flow| {
                total
                    .saturating_add(flow.download)
                    .saturating_add(flow.upload)
            });
        Ok(Some(FlushSummary {
            window_start,
            flows: flows.len(),
            bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets() {
        let ts: DateTime<Utc> = "2019-10-27T03:40:00.001Z".parse().unwrap();
        assert_eq!(Granularity::Hour.bucket(ts), "2019-10-27T03");
        assert_eq!(Granularity::Day.bucket(ts), "2019-10-27");
        assert_eq!(Granularity::Month.bucket(ts), "2019-10");
    }

    #[test]
    fn test_bucket_uses_utc() {
        let ts: DateTime<Utc> = "2019-10-31T23:30:00-02:00".parse().unwrap();
        assert_eq!(Granularity::Month.bucket(ts), "2019-11");
    }

    #[test]
    fn test_format_instant() {
        let millis: DateTime<Utc> = "2019-10-27T03:40:00.001Z".parse().unwrap();
        let whole: DateTime<Utc> = "2019-10-27T03:40:00Z".parse().unwrap();
        let micros: DateTime<Utc> = "2019-10-27T03:40:00.000123Z".parse().unwrap();

        assert_eq!(format_instant(millis), "2019-10-27T03:40:00.001Z");
        assert_eq!(format_instant(whole), "2019-10-27T03:40:00Z");
        assert_eq!(format_instant(micros), "2019-10-27T03:40:00.000123Z");
    }
}
