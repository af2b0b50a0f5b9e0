//! Append-only monthly CSV of flow aggregates

use crate::capture::aggregator::{sorted_by_time, FlowMap};
use crate::report::{format_instant, Granularity};
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const CSV_HEADER: &str = "time\tlocal_ip\tremote_ip\tremote_port\tprotocol\tdownload\tupload\n";

/// Appends one tab-separated line per flow to `fritz-capture-<YYYY-MM>.csv`
#[derive(Debug, Clone)]
pub struct CsvWriter {
    data_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// CSV file receiving the window that starts at `window_start`
    pub fn file_path(&self, window_start: DateTime<Utc>) -> PathBuf {
        self.data_dir.join(format!(
            "fritz-capture-{}.csv",
            Granularity::Month.bucket(window_start)
        ))
    }

    /// Append `flows` sorted by time, writing the header first if the file
    /// does not exist yet
    pub async fn append(&self, window_start: DateTime<Utc>, flows: &FlowMap) -> Result<()> {
        let path = self.file_path(window_start);
        let mut chunk = String::new();

        if !exists(&path).await? {
            chunk.push_str(CSV_HEADER);
        }

        for flow in sorted_by_time(flows) {
            // Writing into a String cannot fail.
            let _ = writeln!(
                chunk,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                format_instant(flow.first_seen),
                flow.key.local_ip,
                flow.key.remote_ip,
                flow.key.remote_port,
                flow.key.protocol,
                flow.download,
                flow.upload,
            );
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended {} flows to {}", flows.len(), path.display());
        Ok(())
    }
}

async fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{compact, ClassifiedPacket};
    use tempfile::TempDir;

    fn packet(ts: &str, local: &str, len: u64, is_upload: bool) -> ClassifiedPacket {
        ClassifiedPacket {
            timestamp: ts.parse().unwrap(),
            frame_length: len,
            is_upload,
            local_ip: local.to_string(),
            remote_ip: "128.65.210.180".to_string(),
            remote_port: "443".to_string(),
            protocol: "tcp:tls".to_string(),
        }
    }

    fn ts(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let writer = CsvWriter::new(dir.path());

        let first = compact(&[packet("2019-10-27T13:40:00.001Z", "192.168.2.100", 1003, false)]);
        let second = compact(&[packet("2019-10-28T08:00:00Z", "192.168.2.101", 20, true)]);

        writer.append(ts("2019-10-27T13:40:00.001Z"), &first).await.unwrap();
        writer.append(ts("2019-10-28T08:00:00Z"), &second).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("fritz-capture-2019-10.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(format!("{}\n", lines[0]), CSV_HEADER);
        assert_eq!(
            lines[1],
            "2019-10-27T13:40:00.001Z\t192.168.2.100\t128.65.210.180\t443\ttcp:tls\t1003\t0"
        );
        assert_eq!(
            lines[2],
            "2019-10-28T08:00:00Z\t192.168.2.101\t128.65.210.180\t443\ttcp:tls\t0\t20"
        );
        assert_eq!(content.matches("time\tlocal_ip").count(), 1);
    }

    #[tokio::test]
    async fn test_lines_sorted_by_time() {
        let dir = TempDir::new().unwrap();
        let writer = CsvWriter::new(dir.path());

        let packets = vec![
            packet("2019-10-27T13:40:05Z", "192.168.2.102", 5, false),
            packet("2019-10-27T13:40:01Z", "192.168.2.100", 1, false),
            packet("2019-10-27T13:40:03Z", "192.168.2.101", 3, false),
        ];
        writer
            .append(ts("2019-10-27T13:40:01Z"), &compact(&packets))
            .await
            .unwrap();

        let content = std::fs::read_to_string(writer.file_path(ts("2019-10-27T13:40:01Z"))).unwrap();
        let locals: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(locals, ["192.168.2.100", "192.168.2.101", "192.168.2.102"]);
    }

    #[tokio::test]
    async fn test_existing_file_gets_no_header() {
        let dir = TempDir::new().unwrap();
        let writer = CsvWriter::new(dir.path());
        let path = writer.file_path(ts("2019-10-27T13:40:00Z"));
        std::fs::write(&path, "previous run\n").unwrap();

        let flows = compact(&[packet("2019-10-27T13:40:00Z", "192.168.2.100", 7, false)]);
        writer.append(ts("2019-10-27T13:40:00Z"), &flows).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("previous run\n"));
        assert!(!content.contains("local_ip"));
    }
}
